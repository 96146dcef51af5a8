//! Pure precondition checks for the two transitions.
//!
//! No IO, no clock. The engine calls these on the row it has just locked, so
//! a `Ok(())` here is only meaningful inside that transaction.

use gfs_schemas::{InstallData, Quote};

use crate::error::TransitionError;

/// `approve_quote` preconditions, checked in this order:
/// already approved, then already converted.
pub fn check_approvable(quote: &Quote) -> Result<(), TransitionError> {
    if quote.is_approved() {
        return Err(TransitionError::AlreadyApproved { quote_id: quote.id });
    }
    if quote.converted_to_install {
        return Err(TransitionError::AlreadyConverted { quote_id: quote.id });
    }
    Ok(())
}

/// `convert_quote_to_install` preconditions, checked in this order:
/// not approved, then already converted.
pub fn check_convertible(quote: &Quote) -> Result<(), TransitionError> {
    if !quote.is_approved() {
        return Err(TransitionError::NotApproved { quote_id: quote.id });
    }
    if quote.converted_to_install {
        return Err(TransitionError::AlreadyConverted { quote_id: quote.id });
    }
    Ok(())
}

/// Actor identifiers are recorded verbatim but must not be blank.
pub fn validate_actor(field: &'static str, actor: &str) -> Result<(), TransitionError> {
    if actor.trim().is_empty() {
        return Err(TransitionError::Invalid(format!("{field} is required")));
    }
    Ok(())
}

/// Shape checks only. Signs and generator fields are recorded as given.
pub fn validate_install_data(data: &InstallData) -> Result<(), TransitionError> {
    validate_actor("created_by", &data.created_by)?;

    for (name, value) in [
        ("material_cost", data.material_cost),
        ("labor_cost", data.labor_cost),
        ("total_cost", data.total_cost),
    ] {
        if value.is_some_and(|v| !v.is_finite()) {
            return Err(TransitionError::Invalid(format!("{name} must be a finite number")));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gfs_schemas::{GeneratorInfo, QuoteStatus};

    fn quote(status: QuoteStatus, converted: bool) -> Quote {
        let now = Utc::now();
        Quote {
            id: 7,
            customer_id: Some(100),
            description: None,
            quote_amount: None,
            quote_status: status,
            converted_to_install: converted,
            install_order_id: if converted { Some(1) } else { None },
            approval_date: None,
            approved_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn draft_and_pending_are_approvable() {
        assert!(check_approvable(&quote(QuoteStatus::Draft, false)).is_ok());
        assert!(check_approvable(&quote(QuoteStatus::Pending, false)).is_ok());
    }

    #[test]
    fn approved_quote_reports_already_approved_before_converted() {
        let err = check_approvable(&quote(QuoteStatus::Approved, true)).unwrap_err();
        assert!(matches!(err, TransitionError::AlreadyApproved { quote_id: 7 }));
    }

    #[test]
    fn converted_but_unapproved_row_is_not_reapprovable() {
        // Not reachable through the engine, but a hand-edited row must still be refused.
        let err = check_approvable(&quote(QuoteStatus::Pending, true)).unwrap_err();
        assert!(matches!(err, TransitionError::AlreadyConverted { quote_id: 7 }));
    }

    #[test]
    fn conversion_requires_approval_first() {
        let err = check_convertible(&quote(QuoteStatus::Pending, false)).unwrap_err();
        assert!(matches!(err, TransitionError::NotApproved { quote_id: 7 }));
        assert!(check_convertible(&quote(QuoteStatus::Approved, false)).is_ok());
        let err = check_convertible(&quote(QuoteStatus::Approved, true)).unwrap_err();
        assert!(matches!(err, TransitionError::AlreadyConverted { quote_id: 7 }));
    }

    #[test]
    fn install_data_validation() {
        let ok = InstallData::new(100, "user-7");
        assert!(validate_install_data(&ok).is_ok());

        let mut bad = ok.clone();
        bad.created_by = "  ".into();
        assert!(matches!(
            validate_install_data(&bad),
            Err(TransitionError::Invalid(_))
        ));

        let mut bad = ok;
        bad.total_cost = Some(f64::NAN);
        assert!(validate_install_data(&bad).is_err());
    }

    #[test]
    fn costs_and_equipment_are_recorded_as_given() {
        let mut data = InstallData::new(0, "user-7");
        data.labor_cost = Some(-250.0);
        data.material_cost = Some(0.0);
        data.generator_info = Some(GeneratorInfo {
            brand: "".into(),
            model: "".into(),
            features: vec![],
        });
        assert!(validate_install_data(&data).is_ok());
    }
}
