//! Session-wide immutable state: `SessionContext` and the `Session` bundle
//! that carries it alongside the ambient config/counters/log stack.
//!
//! `SessionContext` is built once, on the coordinator, from resolved CLI
//! flags (see `fdq_node::cli`), then broadcast verbatim to every worker. It
//! is never mutated after that; every module that needs it takes
//! `&SessionContext`.
//!
//! Generalizes `workflow::Workflow`'s bundle, which groups `{cfg, log,
//! ctrs}` so callers pass one variable instead of three, into a bundle that
//! also carries the distributed session's resolved context.

use serde::{Deserialize, Serialize};

use crate::flow::record::FieldId;
use crate::workflow::{Config, Counters, Log};

/// This process's role in the static W+1 process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Coordinator,
    Worker(u32), // 1-based rank
}

/// The four query modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkingMode {
    List,
    Sort,
    Aggr,
    Meta,
}

/// Ordering direction for the sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Role a field plays in a [`FieldSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldRole {
    Key,
    AggregateSum,
    AggregateMin,
    AggregateMax,
    Sort,
}

/// One (field-id, role) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: FieldId,
    pub role: FieldRole,
}

/// An ordered sequence of (field-id, role) pairs.
///
/// Invariant (checked by [`FieldSet::validate`]): at most one field has role
/// `Sort`; if present it is also aggregated; at least one field is an
/// aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    pub fields: Vec<FieldSpec>,
}

impl FieldSet {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.fields.iter().filter(|f| f.role == FieldRole::Key).map(|f| f.field)
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &FieldSpec> + '_ {
        self.fields.iter().filter(|f| {
            matches!(f.role, FieldRole::AggregateSum | FieldRole::AggregateMin | FieldRole::AggregateMax)
        })
    }

    pub fn sort_field(&self) -> Option<FieldId> {
        self.fields.iter().find(|f| f.role == FieldRole::Sort).map(|f| f.field)
    }

    /// Validate the `FieldSet` invariant above. Returns `Err` with a
    /// human-readable reason on violation.
    pub fn validate(&self) -> Result<(), String> {
        let sort_specs: Vec<_> = self.fields.iter().filter(|f| f.role == FieldRole::Sort).collect();
        if sort_specs.len() > 1 {
            return Err("at most one field may have role `sort`".to_string());
        }
        if let Some(sort_spec) = sort_specs.first() {
            let also_aggregated = self.fields.iter().any(|f| {
                f.field == sort_spec.field
                    && matches!(f.role, FieldRole::AggregateSum | FieldRole::AggregateMin | FieldRole::AggregateMax)
            });
            if !also_aggregated {
                return Err("the sort field must also appear with an aggregate role".to_string());
            }
        }
        if self.aggregates().next().is_none() {
            return Err("at least one field must have an aggregate role".to_string());
        }
        Ok(())
    }
}

/// A half-open UTC time interval `[start, end)`, used by file discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: i64, // unix seconds
    pub end: i64,   // unix seconds, exclusive
}

/// Immutable, broadcast session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub mode: WorkingMode,
    pub fields: FieldSet,
    pub limit: usize, // 0 means unbounded
    pub time_interval: Option<TimeInterval>,
    pub filter_expr: Option<String>,
    pub path: String,
    pub use_tput: bool,
    pub sort_direction: SortDirection,
    pub xchg_buff_size: usize,
    pub progress: crate::progress::ProgressConfig,
    pub output_format: crate::format::OutputFormat,
}

impl SessionContext {
    /// Validate everything that can be checked before any process is
    /// contacted, so CLI resolution rejects bad flag combinations with
    /// `BadArgument` up front.
    pub fn validate(&self) -> Result<(), String> {
        self.fields.validate()?;
        if self.mode == WorkingMode::Sort && self.fields.sort_field().is_none() {
            return Err("`sort` mode requires a field with role `sort`".to_string());
        }
        if self.use_tput {
            if self.mode != WorkingMode::Aggr {
                return Err("--tput is only meaningful with `aggr` mode".to_string());
            }
            if self.limit == 0 {
                return Err("--tput requires a positive record limit (N > 0)".to_string());
            }
            if self.fields.sort_field().is_none() {
                return Err("--tput requires a field with role `sort`".to_string());
            }
        }
        Ok(())
    }
}

/// Bundles the ambient stack (config, counters, logging) with the resolved
/// session context, mirroring `workflow::Workflow`'s convention of passing
/// one object (`w`) instead of three.
pub struct Session {
    pub cfg: Config,
    pub ctrs: Counters,
    pub log: Log,
    pub context: SessionContext,
    pub role: Role,
}

impl Session {
    pub fn new(tool: &str, cfg: Config, ctrs: Counters, context: SessionContext, role: Role) -> Self {
        Self {
            cfg,
            ctrs,
            log: Log::new(tool),
            context,
            role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(field: FieldId, role: FieldRole) -> FieldSpec {
        FieldSpec { field, role }
    }

    #[test]
    fn fieldset_rejects_unaggregated_sort_field() {
        let fs = FieldSet::new(vec![
            field(FieldId::Protocol, FieldRole::Key),
            field(FieldId::Octets, FieldRole::Sort),
        ]);
        assert!(fs.validate().is_err());
    }

    #[test]
    fn fieldset_accepts_aggregated_sort_field() {
        let fs = FieldSet::new(vec![
            field(FieldId::Protocol, FieldRole::Key),
            field(FieldId::Octets, FieldRole::AggregateSum),
        ]);
        // Octets has an aggregate role but is not itself marked `sort` here;
        // a second spec entry makes it both, as the invariant requires.
        let fs_sorted = FieldSet::new(vec![
            field(FieldId::Protocol, FieldRole::Key),
            field(FieldId::Octets, FieldRole::AggregateSum),
            field(FieldId::Octets, FieldRole::Sort),
        ]);
        assert!(fs.validate().is_ok());
        assert!(fs_sorted.validate().is_ok());
    }

    #[test]
    fn fieldset_rejects_multiple_sort_fields() {
        let fs = FieldSet::new(vec![
            field(FieldId::SrcPort, FieldRole::Sort),
            field(FieldId::SrcPort, FieldRole::AggregateSum),
            field(FieldId::DstPort, FieldRole::Sort),
            field(FieldId::DstPort, FieldRole::AggregateSum),
        ]);
        assert!(fs.validate().is_err());
    }
}
