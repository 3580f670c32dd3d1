//! Migration-complexity scoring.
//!
//! The score is a pure function of the finding kind and a handful of textual
//! signals, so re-ingesting an unchanged repository always reproduces it.
//! Low = pure data/markup, Medium = logic bound to the framework,
//! High = framework-integrated stateful behavior.

use chunk_prep::MigrationComplexity;

/// Signals that mark stateful, framework-entangled Java code.
const STATEFUL_SIGNALS: &[&str] = &["getSession", "HttpSession", "ActionForm", "servlet"];

/// Signals that mark direct data access inside view-layer code.
const DATA_ACCESS_SIGNALS: &[&str] = &["java.sql", "DriverManager", "Connection", "ResultSet"];

pub fn score_struts_action(forward_count: usize, class_text: Option<&str>) -> MigrationComplexity {
    let stateful = class_text.is_some_and(has_stateful_signal);
    if stateful || forward_count > 3 {
        MigrationComplexity::High
    } else {
        MigrationComplexity::Medium
    }
}

pub fn score_jsp(has_scriptlets: bool, text: &str) -> MigrationComplexity {
    if !has_scriptlets {
        return MigrationComplexity::Low;
    }
    if has_data_access_signal(text) || has_stateful_signal(text) {
        MigrationComplexity::High
    } else {
        MigrationComplexity::Medium
    }
}

/// CORBA couples the caller to an ORB runtime and remote object lifecycles.
pub fn score_corba() -> MigrationComplexity {
    MigrationComplexity::High
}

pub fn score_business_rule() -> MigrationComplexity {
    MigrationComplexity::Medium
}

/// POM entries are pure data.
pub fn score_maven() -> MigrationComplexity {
    MigrationComplexity::Low
}

fn has_stateful_signal(text: &str) -> bool {
    STATEFUL_SIGNALS.iter().any(|s| text.contains(s))
}

fn has_data_access_signal(text: &str) -> bool {
    DATA_ACCESS_SIGNALS.iter().any(|s| text.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_markup_jsp_is_low() {
        assert_eq!(score_jsp(false, "<html/>"), MigrationComplexity::Low);
    }

    #[test]
    fn scriptlet_jsp_is_medium_until_it_touches_sql() {
        assert_eq!(
            score_jsp(true, "<% int x = 1; %>"),
            MigrationComplexity::Medium
        );
        assert_eq!(
            score_jsp(true, "<% Connection c = DriverManager.getConnection(url); %>"),
            MigrationComplexity::High
        );
    }

    #[test]
    fn session_bound_action_is_high() {
        assert_eq!(
            score_struts_action(1, Some("request.getSession().setAttribute(k, v);")),
            MigrationComplexity::High
        );
        assert_eq!(score_struts_action(2, None), MigrationComplexity::Medium);
        assert_eq!(score_struts_action(5, None), MigrationComplexity::High);
    }
}
