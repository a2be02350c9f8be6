//! Registry of node models and type converters
//!
//! Built once by the host and handed to the scene; there is no global
//! registry.

use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};

use super::converter::{FnConverter, RegisteredConverter, TypeConverter, TypeConverterId};
use super::data::{NodeData, NodeDataType};
use super::model::NodeDataModel;

type ModelCreatorFn = Box<dyn Fn() -> Box<dyn NodeDataModel>>;

#[derive(Default)]
pub struct DataModelRegistry {
    creators: BTreeMap<String, ModelCreatorFn>,
    converters: HashMap<(String, String), RegisteredConverter>,
}

impl DataModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model factory under the model's unique name
    pub fn register_model<F>(&mut self, name: impl Into<String>, create: F)
    where
        F: Fn() -> Box<dyn NodeDataModel> + 'static,
    {
        let name = name.into();
        if self.creators.insert(name.clone(), Box::new(create)).is_some() {
            warn!("Model '{}' registered twice; keeping the latest", name);
        } else {
            debug!("Registered model '{}'", name);
        }
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn NodeDataModel>> {
        self.creators.get(name).map(|create| create())
    }

    /// Registered model names, sorted
    pub fn registered_model_names(&self) -> Vec<&str> {
        self.creators.keys().map(String::as_str).collect()
    }

    /// Registers a converter prototype for one ordered type pair
    pub fn register_type_converter<C>(&mut self, id: TypeConverterId, converter: C)
    where
        C: TypeConverter + 'static,
    {
        debug!("Registered converter {}", id);
        self.converters
            .insert(id.key(), RegisteredConverter::new(id, Box::new(converter)));
    }

    /// Registers a synchronous converter from a plain function
    pub fn register_fn_converter<F>(&mut self, from: NodeDataType, to: NodeDataType, convert: F)
    where
        F: Fn(NodeData) -> Option<NodeData> + Clone + 'static,
    {
        self.register_type_converter(TypeConverterId::new(from, to), FnConverter::new(convert));
    }

    /// Converter for exactly this ordered pair; there is no chaining
    pub fn get_type_converter(&self, from: &NodeDataType, to: &NodeDataType) -> Option<&RegisteredConverter> {
        self.converters.get(&(from.id.clone(), to.id.clone()))
    }

    pub fn converter_count(&self) -> usize {
        self.converters.len()
    }
}

impl std::fmt::Debug for DataModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataModelRegistry")
            .field("models", &self.registered_model_names())
            .field("converters", &self.converters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::test_models::SourceModel;

    #[test]
    fn test_model_registration() {
        let mut registry = DataModelRegistry::new();
        registry.register_model("Source", || Box::new(SourceModel::new("number")));
        registry.register_model("Another", || Box::new(SourceModel::new("text")));

        assert_eq!(registry.registered_model_names(), vec!["Another", "Source"]);
        assert_eq!(registry.create("Source").unwrap().name(), "Source");
        assert!(registry.create("Missing").is_none());
    }

    #[test]
    fn test_converter_lookup_is_exact_and_ordered() {
        let mut registry = DataModelRegistry::new();
        registry.register_fn_converter(NodeDataType::integer(), NodeDataType::number(), |data| match data {
            NodeData::Integer(i) => Some(NodeData::Number(i as f64)),
            _ => None,
        });

        let found = registry.get_type_converter(&NodeDataType::integer(), &NodeDataType::new("number", "Real"));
        assert_eq!(found.unwrap().id().to.id, "number");
        assert!(registry
            .get_type_converter(&NodeDataType::number(), &NodeDataType::integer())
            .is_none());
        assert_eq!(registry.converter_count(), 1);
    }
}
