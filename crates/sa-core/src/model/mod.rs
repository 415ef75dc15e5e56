//! Influence-diagram model: variables, tables and the diagram that owns them.

pub mod allocation;
pub mod diagram;
pub mod exchange;
pub mod source;
pub mod table;
pub mod variable;

pub use allocation::{build_allocation_model, scenario, scenarios, Scenario};
pub use diagram::{InfluenceDiagram, Node, Violation};
pub use source::{load_model, LoadedModel};
pub use table::{RowDefect, Table};
pub use variable::{Domain, VarId, Variable, VariableRegistry};
