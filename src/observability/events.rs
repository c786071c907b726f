//! Observable events
//!
//! Events are explicit and typed; each maps to a stable log name and a
//! default severity.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Configuration file loaded
    ConfigLoaded,
    /// Entity schemas registered
    SchemasLoaded,
    /// A clause passed validation and was folded into the plan
    ClauseApplied,
    /// A clause was rejected; the plan is unchanged
    ClauseRejected,
    /// `end()` produced an immutable plan
    PlanFinalized,
    /// The execution engine produced a result set
    QueryExecuted,
    /// The execution engine failed
    QueryFailed,
    /// Explain output produced
    ExplainComplete,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SchemasLoaded => "SCHEMAS_LOADED",
            Event::ClauseApplied => "CLAUSE_APPLIED",
            Event::ClauseRejected => "CLAUSE_REJECTED",
            Event::PlanFinalized => "PLAN_FINALIZED",
            Event::QueryExecuted => "QUERY_EXECUTED",
            Event::QueryFailed => "QUERY_FAILED",
            Event::ExplainComplete => "EXPLAIN_COMPLETE",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::ClauseApplied => Severity::Trace,
            Event::ClauseRejected => Severity::Warn,
            Event::QueryFailed => Severity::Error,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_upper_snake() {
        let events = [
            Event::ConfigLoaded,
            Event::SchemasLoaded,
            Event::ClauseApplied,
            Event::ClauseRejected,
            Event::PlanFinalized,
            Event::QueryExecuted,
            Event::QueryFailed,
            Event::ExplainComplete,
        ];
        for event in events {
            assert!(event.as_str().chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(Event::ClauseApplied.severity(), Severity::Trace);
        assert_eq!(Event::ClauseRejected.severity(), Severity::Warn);
        assert_eq!(Event::PlanFinalized.severity(), Severity::Info);
    }
}
