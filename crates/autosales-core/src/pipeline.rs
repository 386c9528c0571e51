//! Pipeline stages
//!
//! The warehouse build is a fixed sequence of stages. Each stage consumes the
//! previous stage's output and the first failure aborts the run.
//!
//! | Stage          | Output                                   |
//! |----------------|------------------------------------------|
//! | `Extract`      | [`RawDataset`](crate::extract::RawDataset) |
//! | `Transform`    | [`TransformReport`](crate::transform::TransformReport) |
//! | `CreateSchema` | tables exist                             |
//! | `Load`         | [`LoadSummary`](crate::load::LoadSummary) |
//! | `Verify`       | verification report                      |
//! | `Teardown`     | connection closed, server stopped        |

use std::fmt;

/// One step of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Fetch the raw dataset
    Extract,
    /// Normalize and split into staged files
    Transform,
    /// Start the database server (embedded mode)
    StartDatabase,
    /// Create warehouse tables
    CreateSchema,
    /// Load dimensions, then facts
    Load,
    /// Run verification queries
    Verify,
    /// Close the connection and stop the server
    Teardown,
}

impl Stage {
    /// Every stage, in execution order
    pub const ALL: [Stage; 7] = [
        Stage::Extract,
        Stage::Transform,
        Stage::StartDatabase,
        Stage::CreateSchema,
        Stage::Load,
        Stage::Verify,
        Stage::Teardown,
    ];

    /// Stage name used in logs and errors
    pub fn name(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::StartDatabase => "start-database",
            Stage::CreateSchema => "create-schema",
            Stage::Load => "load",
            Stage::Verify => "verify",
            Stage::Teardown => "teardown",
        }
    }

    /// 1-based position in the run
    pub fn position(self) -> usize {
        Stage::ALL.iter().position(|s| *s == self).unwrap_or(0) + 1
    }

    /// Log the start of this stage
    pub fn begin(self) {
        tracing::info!(
            "[{}/{}] {}",
            self.position(),
            Stage::ALL.len(),
            self.name()
        );
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Load > Stage::CreateSchema);
        assert!(Stage::Verify > Stage::Load);
        assert_eq!(Stage::Extract.position(), 1);
        assert_eq!(Stage::Teardown.position(), Stage::ALL.len());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::CreateSchema.to_string(), "create-schema");
    }
}
