//! Semantic domain model.
//!
//! Typed entities the rest of the system executes against: [`Task`],
//! [`Parameter`], [`Project`], the [`Statement`] union, and the runtime
//! [`Value`] model. Built from the AST by [`convert`] and owned by the
//! registry from then on.

pub mod convert;
pub mod parameter;
pub mod project;
pub mod statement;
pub mod task;
pub mod value;

pub use convert::{lower_param, lower_project, lower_statement, lower_statements, lower_task};
pub use parameter::{ParamKind, Parameter};
pub use project::{Hooks, Project, ShellConfig};
pub use statement::{
    ActionVerb, AuthNode, CatchClause, Detection, DownloadSpec, FileOp, Filter, FilterOp,
    HttpSpec, Iterable, LoopSpec, NetworkAction, PermissionSpec, SecretOp, ShellMode, Statement,
    ThrowKind, VarOp,
};
pub use task::{Dependency, MatrixAxis, SemanticError, Task};
pub use value::{DataType, Value, format_number, parse_boolean, split_list};
