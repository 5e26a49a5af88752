use std::fmt::{Display, Formatter};
use std::str::FromStr;

use query_harness_core::prelude::ConfigurationError;

use crate::suite::QuerySuite;

const PROCESS_RUNNER: &str = "ProcessRunner";

/// The suites the harness can run, by the name they are selected with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteKind {
    Query,
}

impl SuiteKind {
    pub const ALL: [SuiteKind; 1] = [SuiteKind::Query];

    pub fn name(&self) -> &'static str {
        match self {
            SuiteKind::Query => QuerySuite::NAME,
        }
    }

    /// Names of the runners that can execute this suite.
    pub fn runners(&self) -> &'static [&'static str] {
        match self {
            SuiteKind::Query => &[PROCESS_RUNNER],
        }
    }

    pub fn validate_runner(&self, runner: &str) -> Result<(), ConfigurationError> {
        if self.runners().contains(&runner) {
            Ok(())
        } else {
            Err(ConfigurationError::new(format!(
                "Runner '{runner}' not registered for suite '{self}'. Registered runners are: {:?}",
                self.runners()
            )))
        }
    }
}

impl Display for SuiteKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SuiteKind {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SuiteKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                ConfigurationError::new(format!(
                    "Suite '{s}' isn't registered. Registered suites are: {:?}",
                    SuiteKind::ALL.map(|k| k.name())
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_names() {
        let suite: SuiteKind = "QuerySuite".parse().unwrap();
        assert_eq!(SuiteKind::Query, suite);
        assert!(suite.validate_runner("ProcessRunner").is_ok());
    }

    #[test]
    fn unknown_names_list_what_is_registered() {
        let err = "QuerySuit".parse::<SuiteKind>().unwrap_err();
        assert!(err.to_string().contains("QuerySuite"));

        let err = SuiteKind::Query.validate_runner("MemgraphRunner").unwrap_err();
        assert!(err.to_string().contains("ProcessRunner"));
    }
}
