use crate::infra::{build_service_with, parse_date, LoggingEventPublisher};
use chrono::{Local, NaiveDate};
use clap::Args;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tenant_compliance::config::AppConfig;
use tenant_compliance::error::AppError;
use tenant_compliance::workflows::certification::{
    CertificationOutcome, ComplianceEvent, ComplianceEventPublisher, EventError,
    NewTenantRequest, PropertyId, RecertificationOutcome, RecertificationRequest,
};

const DEMO_PROPERTY: &str = "DEMO-COMMONS";

/// Logs like the server and keeps the events so the demo can print them at the end.
#[derive(Default)]
struct RecordingEventPublisher {
    events: Mutex<Vec<ComplianceEvent>>,
}

impl RecordingEventPublisher {
    fn events(&self) -> Vec<ComplianceEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ComplianceEventPublisher for RecordingEventPublisher {
    fn publish(&self, event: ComplianceEvent) -> Result<(), EventError> {
        LoggingEventPublisher.publish(event.clone())?;
        self.events
            .lock()
            .map_err(|_| EventError::Transport("event log lock poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Household size at move-in and at recertification.
    #[arg(long, default_value_t = 1)]
    pub(crate) household_size: i64,
    /// Gross annual income certified at move-in.
    #[arg(long, default_value = "30000")]
    pub(crate) move_in_income: Decimal,
    /// Gross annual income reported at the annual recertification.
    #[arg(long, default_value = "48000")]
    pub(crate) recert_income: Decimal,
    /// Contract rent for the demo unit.
    #[arg(long, default_value = "795")]
    pub(crate) monthly_rent: Decimal,
    /// Move-in date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) move_in: Option<NaiveDate>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let events = Arc::new(RecordingEventPublisher::default());
    let service = build_service_with(&config.compliance, events.clone())?;
    let move_in = args.move_in.unwrap_or_else(|| Local::now().date_naive());

    println!("Tenant compliance demo");
    let certified = service.create_tenant(NewTenantRequest {
        property_id: DEMO_PROPERTY.to_string(),
        unit_number: "2C".to_string(),
        tenant_name: "Sample Household".to_string(),
        move_in_date: move_in,
        lease_expiration: move_in.checked_add_signed(chrono::Duration::days(364)),
        household_size: args.household_size,
        gross_annual_income: args.move_in_income,
        monthly_rent: args.monthly_rent,
        utility_allowance: Decimal::from(75),
    })?;
    render_certification(&certified);

    let recertified = service.recertify_tenant(
        &certified.tenant.id,
        RecertificationRequest {
            gross_annual_income: args.recert_income,
            household_size: args.household_size,
            documentation_notes: "Demo: employer verification and two pay stubs".to_string(),
            certified_on: None,
        },
    )?;
    render_recertification(&recertified);

    let view = service.property_compliance(&PropertyId(DEMO_PROPERTY.to_string()))?;
    println!("\nProperty {} snapshot", view.property_id);
    println!(
        "- {} units | {} qualifying | {} very low | {} low | {} market rate | {} over income",
        view.total_units,
        view.qualifying_units,
        view.counts.very_low,
        view.counts.low,
        view.counts.market_rate,
        view.counts.over_income
    );

    for event in events.events() {
        match event {
            ComplianceEvent::OverIncome(notice) => println!(
                "- event: unit {} over income ({} > {}); next comparable vacancy goes to a qualifying household",
                notice.unit_number, notice.new_income, notice.over_income_trigger
            ),
        }
    }

    Ok(())
}

fn render_certification(outcome: &CertificationOutcome) {
    let tenant = &outcome.tenant;
    println!(
        "\nMove-in certification for unit {} (program year {})",
        tenant.unit_number, tenant.program_year
    );
    println!(
        "- income {} for a household of {} -> {} ({}% AMI)",
        tenant.gross_annual_income,
        tenant.household_size,
        tenant.income_category,
        tenant.ami_percentage
    );
    render_rent(tenant.monthly_rent, outcome.max_rent, outcome.rent_exceeds_ceiling);
}

fn render_recertification(outcome: &RecertificationOutcome) {
    let record = &outcome.record;
    println!("\nAnnual recertification ({})", record.certified_at.date_naive());
    println!(
        "- income {} -> {} (was {} at {})",
        record.new_income, record.new_category, record.previous_category, record.previous_income
    );
    match (record.applicable_limit, record.over_income_trigger) {
        (Some(limit), Some(trigger)) => println!(
            "- safe harbor: limit {} | trigger {} | over income: {}",
            limit,
            trigger,
            if record.over_income_flag { "YES" } else { "no" }
        ),
        _ => println!("- safe harbor: not applicable to a market-rate tenancy"),
    }
    render_rent(
        outcome.tenant.monthly_rent,
        outcome.max_rent,
        outcome.rent_exceeds_ceiling,
    );
}

fn render_rent(monthly_rent: Decimal, max_rent: Option<Decimal>, exceeds: bool) {
    match max_rent {
        Some(ceiling) if exceeds => {
            println!("- rent {monthly_rent} EXCEEDS the {ceiling}/month ceiling")
        }
        Some(ceiling) => println!("- rent {monthly_rent} within the {ceiling}/month ceiling"),
        None => println!("- rent {monthly_rent} (market rate, no ceiling)"),
    }
}
