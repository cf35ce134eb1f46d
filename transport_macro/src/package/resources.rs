//! Resource directives
//!
//! Templates declare the arrays that rolled output should index into.
//! The declarations live in a `ResourceManager` shared with the packages
//! that consult them.

use super::Package;
use crate::index::{AbstractIndex, IndexClass};
use crate::rules::{IndexDirective, RegistryError, RuleRegistryBuilder, SimpleRule};
use std::sync::{Arc, Mutex};

pub type SharedResources = Arc<Mutex<ResourceManager>>;

/// Resource declared for a derivative array, with the index it is labelled by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeResource {
    pub name: String,
    pub index: AbstractIndex,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceManager {
    parameters: Option<String>,
    coordinates: Option<String>,
    dv: Option<DerivativeResource>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedResources {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn set_parameters(&mut self, name: &str) {
        self.parameters = Some(name.to_string());
    }

    pub fn parameters(&self) -> Option<&str> {
        self.parameters.as_deref()
    }

    pub fn set_coordinates(&mut self, name: &str) {
        self.coordinates = Some(name.to_string());
    }

    pub fn coordinates(&self) -> Option<&str> {
        self.coordinates.as_deref()
    }

    pub fn set_dv(&mut self, name: &str, index: AbstractIndex) {
        self.dv = Some(DerivativeResource {
            name: name.to_string(),
            index,
        });
    }

    pub fn dv(&self) -> Option<&DerivativeResource> {
        self.dv.as_ref()
    }

    /// Forget every declaration
    pub fn release(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_none() && self.coordinates.is_none() && self.dv.is_none()
    }
}

/// Run `f` against the locked manager; a poisoned lock fails the directive
pub(crate) fn with_resources<R>(
    resources: &SharedResources,
    f: impl FnOnce(&mut ResourceManager) -> R,
) -> Result<R, String> {
    let mut guard = resources
        .lock()
        .map_err(|_| "resource manager lock poisoned".to_string())?;
    Ok(f(&mut guard))
}

/// Directives that declare and release resources
pub struct ResourcePackage {
    resources: SharedResources,
}

impl ResourcePackage {
    pub fn new(resources: SharedResources) -> Self {
        Self { resources }
    }
}

impl Package for ResourcePackage {
    fn name(&self) -> &str {
        "resources"
    }

    fn register(&self, builder: &mut RuleRegistryBuilder) -> Result<(), RegistryError> {
        let resources = self.resources.clone();
        builder.simple_directive(SimpleRule::new("RESOURCE_PARAMETERS", 1, move |args| {
            with_resources(&resources, |r| r.set_parameters(&args[0]))?;
            Ok(String::new())
        }))?;

        let resources = self.resources.clone();
        builder.simple_directive(SimpleRule::new("RESOURCE_COORDINATES", 1, move |args| {
            with_resources(&resources, |r| r.set_coordinates(&args[0]))?;
            Ok(String::new())
        }))?;

        let resources = self.resources.clone();
        builder.simple_directive(SimpleRule::new("RESOURCE_RELEASE", 0, move |_| {
            with_resources(&resources, ResourceManager::release)?;
            Ok(String::new())
        }))?;

        let resources = self.resources.clone();
        builder.index_directive(IndexDirective::new(
            "RESOURCE_DV",
            1,
            1,
            Some(IndexClass::FieldOnly),
            move |args, indices| {
                with_resources(&resources, |r| r.set_dv(&args[0], indices[0]))?;
                Ok(String::new())
            },
        ))?;

        Ok(())
    }
}
