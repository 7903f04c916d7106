use super::common::*;
use chrono::{TimeZone, Utc};
use std::sync::Arc;

use crate::workflows::certification::domain::{IncomeCategory, PropertyId, TenantId};
use crate::workflows::certification::limits::ConfigurationError;
use crate::workflows::certification::repository::{RepositoryError, TenantRepository};
use crate::workflows::certification::{
    CertificationError, FixedClock, InMemoryTenantStore, ValidationError,
};

#[test]
fn certify_then_recertify_round_trip() {
    let (service, store, _) = build_service();

    let certified = service
        .create_tenant(tenant_request("101", 1, 28000))
        .expect("certified");
    assert_eq!(certified.tenant.income_category, IncomeCategory::VeryLow);
    assert_eq!(certified.tenant.program_year, 2025);
    assert_eq!(certified.tenant.last_certified_at, clock().0);
    assert_eq!(certified.max_rent, Some(amount(750)));
    assert!(!certified.rent_exceeds_ceiling);
    assert!(service
        .recertification_history(&certified.tenant.id)
        .expect("history")
        .is_empty());

    let recert = service
        .recertify_tenant(&certified.tenant.id, recert_request(2, amount(36000)))
        .expect("recertified");

    let stored = store
        .fetch(&certified.tenant.id)
        .expect("fetch")
        .expect("tenant present");
    assert_eq!(stored.version, 2);
    assert_eq!(stored.tenant, recert.tenant);
    assert_eq!(stored.tenant.gross_annual_income, amount(36000));
    assert_eq!(stored.tenant.household_size, size(2));
    assert_eq!(stored.tenant.income_category, recert.record.new_category);
    assert_eq!(stored.tenant.move_in_date, certified.tenant.move_in_date);
    assert_eq!(stored.tenant.monthly_rent, certified.tenant.monthly_rent);

    let record = &recert.record;
    assert_eq!(record.tenant_id, certified.tenant.id);
    assert_eq!(record.previous_income, amount(28000));
    assert_eq!(record.previous_category, IncomeCategory::VeryLow);
    assert_eq!(record.new_income, amount(36000));
    assert_eq!(record.new_category, IncomeCategory::Low);
    assert_eq!(record.certified_at, clock().0);

    let fetched = service.get_tenant(&certified.tenant.id).expect("lookup");
    assert_eq!(fetched.tenant, recert.tenant);
    assert_eq!(fetched.max_rent, recert.max_rent);
}

#[test]
fn recertifying_unchanged_inputs_keeps_category_without_flag() {
    let (service, _, events) = build_service();

    let households = [("101", 1, 28000), ("102", 4, 60000), ("103", 2, 90000)];
    for (unit, household_size, income) in households {
        let certified = service
            .create_tenant(tenant_request(unit, household_size, income))
            .expect("certified");
        let recert = service
            .recertify_tenant(
                &certified.tenant.id,
                recert_request(household_size, amount(income)),
            )
            .expect("recertified");

        assert_eq!(recert.record.previous_category, certified.tenant.income_category);
        assert_eq!(recert.new_category(), certified.tenant.income_category);
        assert_eq!(recert.tenant.ami_percentage, certified.tenant.ami_percentage);
        assert_eq!(recert.max_rent, certified.max_rent);
        assert!(!recert.over_income());
        assert!(!recert.tenant.over_income);
    }

    assert!(events.events().is_empty());
}

#[test]
fn create_tenant_rejects_out_of_range_household() {
    let (service, _, _) = build_service();
    match service.create_tenant(tenant_request("101", 9, 28000)) {
        Err(CertificationError::Validation(ValidationError::HouseholdSizeOutOfRange {
            found: 9,
        })) => {}
        other => panic!("expected household size error, got {other:?}"),
    }
}

#[test]
fn create_tenant_rejects_lease_ending_before_move_in() {
    let (service, _, _) = build_service();
    let mut request = tenant_request("101", 1, 28000);
    request.lease_expiration = Some(date(2025, 4, 1));

    match service.create_tenant(request) {
        Err(CertificationError::Validation(err)) => {
            assert_eq!(err.field(), "lease_expiration")
        }
        other => panic!("expected lease validation error, got {other:?}"),
    }
}

#[test]
fn create_tenant_flags_rent_above_ceiling() {
    let (service, _, _) = build_service();
    let mut request = tenant_request("101", 1, 28000);
    request.monthly_rent = amount(751);

    let outcome = service.create_tenant(request).expect("certified");
    assert_eq!(outcome.max_rent, Some(amount(750)));
    assert!(outcome.rent_exceeds_ceiling);
}

#[test]
fn recertification_requires_documentation() {
    let (service, store, _) = build_service();
    let certified = service
        .create_tenant(tenant_request("101", 1, 28000))
        .expect("certified");

    let mut request = recert_request(1, amount(29000));
    request.documentation_notes = "   ".to_string();
    match service.recertify_tenant(&certified.tenant.id, request) {
        Err(CertificationError::Validation(ValidationError::MissingField { field })) => {
            assert_eq!(field, "documentation_notes")
        }
        other => panic!("expected missing documentation, got {other:?}"),
    }
    assert!(store.history(&certified.tenant.id).expect("history").is_empty());
}

#[test]
fn recertifying_unknown_tenant_is_not_found() {
    let (service, _, _) = build_service();
    let missing = TenantId::generate();
    match service.recertify_tenant(&missing, recert_request(1, amount(29000))) {
        Err(CertificationError::NotFound(id)) => assert_eq!(id, missing),
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn failed_commit_leaves_tenant_untouched() {
    let repository = Arc::new(FailingCommitRepository::new());
    let (service, events) = service_with(repository.clone());

    let certified = service
        .create_tenant(tenant_request("101", 1, 28000))
        .expect("certified");
    let before = repository
        .fetch(&certified.tenant.id)
        .expect("fetch")
        .expect("tenant present");

    match service.recertify_tenant(&certified.tenant.id, recert_request(1, amount(43000))) {
        Err(CertificationError::Persistence(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected persistence failure, got {other:?}"),
    }

    let after = repository
        .fetch(&certified.tenant.id)
        .expect("fetch")
        .expect("tenant present");
    assert_eq!(before, after);
    assert!(repository
        .history(&certified.tenant.id)
        .expect("history")
        .is_empty());
    assert!(events.events().is_empty(), "no event for an uncommitted write");

    let summary = repository
        .property_summary(&PropertyId(PROPERTY.to_string()))
        .expect("summary");
    assert_eq!(summary.very_low, 1);
    assert_eq!(summary.over_income, 0);
}

#[test]
fn conflicting_write_is_retried_then_succeeds() {
    let repository = Arc::new(ContendedRepository::new(2));
    let (service, _) = service_with(repository.clone());

    let certified = service
        .create_tenant(tenant_request("101", 1, 28000))
        .expect("certified");
    let recert = service
        .recertify_tenant(&certified.tenant.id, recert_request(1, amount(29500)))
        .expect("third attempt commits");

    assert_eq!(repository.commit_calls(), 3);
    assert_eq!(
        repository
            .history(&certified.tenant.id)
            .expect("history"),
        vec![recert.record]
    );
}

#[test]
fn conflict_surfaces_after_retries_are_exhausted() {
    let repository = Arc::new(ContendedRepository::new(10));
    let (service, _) = service_with(repository.clone());

    let certified = service
        .create_tenant(tenant_request("101", 1, 28000))
        .expect("certified");
    match service.recertify_tenant(&certified.tenant.id, recert_request(1, amount(29500))) {
        Err(CertificationError::Conflict {
            tenant_id,
            attempts,
        }) => {
            assert_eq!(tenant_id, certified.tenant.id);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    assert_eq!(repository.commit_calls(), 3);
    assert!(repository
        .history(&certified.tenant.id)
        .expect("history")
        .is_empty());
}

#[test]
fn stale_version_is_rejected_by_store() {
    let (service, store, _) = build_service();
    let certified = service
        .create_tenant(tenant_request("101", 1, 28000))
        .expect("certified");
    service
        .recertify_tenant(&certified.tenant.id, recert_request(1, amount(29000)))
        .expect("first write");

    let stale = service
        .recertify_tenant(&certified.tenant.id, recert_request(1, amount(29500)))
        .expect("second write");
    match store.commit_recertification(1, stale.tenant.clone(), stale.record.clone()) {
        Err(RepositoryError::Conflict) => {}
        other => panic!("expected conflict for stale version, got {other:?}"),
    }
}

#[test]
fn property_counts_follow_tenant_state() {
    let (service, _, _) = build_service();
    let property = PropertyId(PROPERTY.to_string());

    let very_low = service
        .create_tenant(tenant_request("101", 1, 28000))
        .expect("certified");
    service
        .create_tenant(tenant_request("102", 1, 40000))
        .expect("certified");
    service
        .create_tenant(tenant_request("103", 1, 90000))
        .expect("certified");

    let view = service.property_compliance(&property).expect("summary");
    assert_eq!(view.counts.very_low, 1);
    assert_eq!(view.counts.low, 1);
    assert_eq!(view.counts.market_rate, 1);
    assert_eq!(view.total_units, 3);
    assert_eq!(view.qualifying_units, 2);

    service
        .recertify_tenant(&very_low.tenant.id, recert_request(1, amount(43000)))
        .expect("recertified");

    let view = service.property_compliance(&property).expect("summary");
    assert_eq!(view.counts.very_low, 0);
    assert_eq!(view.counts.low, 2);
    assert_eq!(view.counts.market_rate, 1);
    assert_eq!(view.counts.over_income, 1);
    assert_eq!(view.total_units, 3);

    let empty = service
        .property_compliance(&PropertyId("ELSEWHERE".to_string()))
        .expect("summary");
    assert_eq!(empty.total_units, 0);
}

#[test]
fn over_income_status_is_sticky() {
    let (service, _, _) = build_service();
    let certified = service
        .create_tenant(tenant_request("101", 1, 28000))
        .expect("certified");

    let first = service
        .recertify_tenant(&certified.tenant.id, recert_request(1, amount(43000)))
        .expect("recertified");
    assert!(first.over_income());

    let second = service
        .recertify_tenant(&certified.tenant.id, recert_request(1, amount(25000)))
        .expect("recertified");
    assert!(!second.over_income());
    assert_eq!(second.new_category(), IncomeCategory::VeryLow);
    assert!(second.tenant.over_income);

    let view = service
        .property_compliance(&PropertyId(PROPERTY.to_string()))
        .expect("summary");
    assert_eq!(view.counts.over_income, 1);
}

#[test]
fn history_is_returned_oldest_first() {
    let (service, _, _) = build_service();
    let certified = service
        .create_tenant(tenant_request("101", 1, 28000))
        .expect("certified");

    for income in [29000, 31000, 36000] {
        service
            .recertify_tenant(&certified.tenant.id, recert_request(1, amount(income)))
            .expect("recertified");
    }

    let history = service
        .recertification_history(&certified.tenant.id)
        .expect("history");
    let incomes: Vec<_> = history.iter().map(|record| record.new_income).collect();
    assert_eq!(incomes, vec![amount(29000), amount(31000), amount(36000)]);
    assert_eq!(history[1].previous_income, amount(29000));
    assert_eq!(history[2].previous_category, IncomeCategory::Low);
}

#[test]
fn back_dated_recertification_uses_table_in_force_then() {
    let store = Arc::new(InMemoryTenantStore::new());
    let (onboarding, _) = service_with_clock(
        store.clone(),
        FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()),
    );
    let mut request = tenant_request("101", 1, 20000);
    request.move_in_date = date(2024, 2, 1);
    request.lease_expiration = Some(date(2025, 1, 31));
    let certified = onboarding.create_tenant(request).expect("certified");
    assert_eq!(certified.tenant.program_year, 2024);

    let (service, _) = service_with(store);

    // 29000 is VERY_LOW under 2025 limits (30000) but LOW under 2024 limits (28000).
    let mut request = recert_request(1, amount(29000));
    request.certified_on = Some(date(2024, 12, 15));
    let recert = service
        .recertify_tenant(&certified.tenant.id, request)
        .expect("recertified");

    assert_eq!(recert.record.program_year, 2024);
    assert_eq!(recert.new_category(), IncomeCategory::Low);
    assert_eq!(recert.tenant.program_year, 2024);
    assert_eq!(recert.tenant.last_certified_at.date_naive(), date(2024, 12, 15));
    assert_eq!(recert.record.applicable_limit, Some(amount(28000)));

    let current = service
        .recertify_tenant(&certified.tenant.id, recert_request(1, amount(29000)))
        .expect("recertified");
    assert_eq!(current.record.program_year, 2025);
    assert_eq!(current.new_category(), IncomeCategory::VeryLow);
    // Anchor is the 2024 LOW limit the back-dated record qualified under.
    assert_eq!(current.record.applicable_limit, Some(amount(44800)));

    let dates: Vec<_> = service
        .recertification_history(&certified.tenant.id)
        .expect("history")
        .iter()
        .map(|record| record.certified_at.date_naive())
        .collect();
    assert_eq!(dates, vec![date(2024, 12, 15), date(2025, 6, 1)]);
}

#[test]
fn certification_date_outside_window_is_rejected() {
    let (service, store, _) = build_service();
    // Moved in 2025-05-01, certified at the clock date 2025-06-01.
    let certified = service
        .create_tenant(tenant_request("101", 1, 20000))
        .expect("certified");
    service
        .recertify_tenant(&certified.tenant.id, recert_request(1, amount(21000)))
        .expect("recertified");

    for certified_on in [date(2024, 6, 1), date(2025, 5, 15), date(2025, 6, 2)] {
        let mut request = recert_request(1, amount(29000));
        request.certified_on = Some(certified_on);
        match service.recertify_tenant(&certified.tenant.id, request) {
            Err(CertificationError::Validation(err)) => {
                assert_eq!(err.field(), "certified_on")
            }
            other => panic!("expected certified_on validation error, got {other:?}"),
        }
    }

    let stored = store
        .fetch(&certified.tenant.id)
        .expect("fetch")
        .expect("tenant present");
    assert_eq!(stored.version, 2);
    assert_eq!(stored.tenant.gross_annual_income, amount(21000));
    assert_eq!(stored.tenant.last_certified_at, clock().0);
    assert_eq!(
        service
            .recertification_history(&certified.tenant.id)
            .expect("history")
            .len(),
        1
    );
}

#[test]
fn missing_anchor_table_is_a_configuration_error() {
    let (service, _, _) = build_service();
    let certified = service
        .create_tenant(tenant_request("101", 1, 20000))
        .expect("certified");
    assert_eq!(certified.tenant.program_year, 2025);

    let registry = crate::workflows::certification::AmiLimitRegistry::from_tables([table_2024()])
        .expect("registry");
    service.limits().replace(registry);

    match service.recertify_tenant(&certified.tenant.id, recert_request(1, amount(29000))) {
        Err(CertificationError::Configuration(ConfigurationError::MissingProgramYear {
            program_year: 2025,
        })) => {}
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn repository_outage_surfaces_as_persistence_error() {
    let (service, _) = service_with(Arc::new(UnavailableRepository));
    match service.create_tenant(tenant_request("101", 1, 20000)) {
        Err(CertificationError::Persistence(RepositoryError::Unavailable(_))) => {}
        other => panic!("expected persistence error, got {other:?}"),
    }
    match service.get_tenant(&TenantId::generate()) {
        Err(CertificationError::Persistence(_)) => {}
        other => panic!("expected persistence error, got {other:?}"),
    }
}

#[test]
fn replacing_limits_applies_to_later_calls() {
    let (service, _, _) = build_service();
    assert_eq!(
        service
            .classify_income(amount(29000), 1)
            .expect("classifies")
            .category,
        IncomeCategory::VeryLow
    );

    let registry = crate::workflows::certification::AmiLimitRegistry::from_tables([table_2024()])
        .expect("registry");
    service.limits().replace(registry);

    let classification = service
        .classify_income(amount(29000), 1)
        .expect("classifies");
    assert_eq!(classification.program_year, 2024);
    assert_eq!(classification.category, IncomeCategory::Low);
}
