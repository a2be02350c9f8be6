//! Math operation nodes

pub mod add;
pub mod converters;
pub mod display;
pub mod number;

pub use add::AdditionModel;
pub use display::{NumberDisplayModel, TextDisplayModel};
pub use number::NumberSourceModel;

use crate::nodes::registry::DataModelRegistry;

/// Registers every math model and its stock converters
pub fn register_all(registry: &mut DataModelRegistry) {
    registry.register_model(NumberSourceModel::NAME, || Box::new(NumberSourceModel::new()));
    registry.register_model(AdditionModel::NAME, || Box::new(AdditionModel::new()));
    registry.register_model(NumberDisplayModel::NAME, || Box::new(NumberDisplayModel::new()));
    registry.register_model(TextDisplayModel::NAME, || Box::new(TextDisplayModel::new()));
    converters::register_converters(registry);
}
