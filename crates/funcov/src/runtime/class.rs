//! Classes, attributes and instances.
//!
//! Attribute access follows descriptor rules: a plain function reached
//! through an instance binds the instance, a classmethod binds the class it
//! was reached through, a staticmethod binds nothing.

use super::{CallArgs, CallError, FunctionObject, Value};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An entry in a class's own attribute dictionary
#[derive(Debug, Clone)]
pub enum Attribute {
    /// Plain function (a method when reached through an instance)
    Function(FunctionObject),
    /// Function declared as a classmethod
    ClassMethod(FunctionObject),
    /// Function declared as a staticmethod
    StaticMethod(FunctionObject),
    /// Nested class
    Class(ClassObject),
    /// Any other class attribute
    Value(Value),
}

impl Attribute {
    /// The wrapped function of a function-like attribute
    #[must_use]
    pub const fn function(&self) -> Option<&FunctionObject> {
        match self {
            Self::Function(f) | Self::ClassMethod(f) | Self::StaticMethod(f) => Some(f),
            Self::Class(_) | Self::Value(_) => None,
        }
    }
}

struct ClassInner {
    qualname: String,
    module: String,
    bases: Vec<ClassObject>,
    dict: RwLock<Vec<(String, Attribute)>>,
}

/// A shared class object
#[derive(Clone)]
pub struct ClassObject(Arc<ClassInner>);

impl fmt::Debug for ClassObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassObject")
            .field("module", &self.0.module)
            .field("qualname", &self.0.qualname)
            .field("attributes", &self.0.dict.read().len())
            .finish()
    }
}

impl ClassObject {
    /// Start building a class defined in `module` under `qualname`
    pub fn builder(module: impl Into<String>, qualname: impl Into<String>) -> ClassBuilder {
        ClassBuilder {
            module: module.into(),
            qualname: qualname.into(),
            bases: Vec::new(),
            dict: Vec::new(),
        }
    }

    /// Unqualified class name
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.qualname.rsplit('.').next().unwrap_or(&self.0.qualname)
    }

    /// Name relative to the module
    #[must_use]
    pub fn qualname(&self) -> &str {
        &self.0.qualname
    }

    /// Dotted name of the defining module
    #[must_use]
    pub fn module(&self) -> &str {
        &self.0.module
    }

    /// Check whether two handles refer to one class
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Attributes defined on this class itself, in definition order
    #[must_use]
    pub fn own_attributes(&self) -> Vec<(String, Attribute)> {
        self.0.dict.read().clone()
    }

    /// Set or replace an attribute on this class
    pub fn set_attr(&self, name: impl Into<String>, attribute: Attribute) {
        let name = name.into();
        let mut dict = self.0.dict.write();
        match dict.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = attribute,
            None => dict.push((name, attribute)),
        }
    }

    /// Resolve an attribute through this class and its bases
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Attribute> {
        let own = self
            .0
            .dict
            .read()
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, attribute)| attribute.clone());
        own.or_else(|| self.0.bases.iter().find_map(|base| base.lookup(name)))
    }

    /// Call an attribute reached through the class itself
    ///
    /// Classmethods receive this class first; plain functions and
    /// staticmethods receive exactly `args`.
    pub fn call_attr(&self, name: &str, args: CallArgs) -> Result<Value, CallError> {
        match self.lookup(name) {
            Some(Attribute::Function(f) | Attribute::StaticMethod(f)) => f.call(args),
            Some(Attribute::ClassMethod(f)) => f.call(args.bind_first(Value::Class(self.clone()))),
            Some(Attribute::Class(class)) => class.instantiate(args),
            Some(Attribute::Value(_)) => Err(CallError::type_error(format!(
                "'{}.{name}' is not callable",
                self.qualname()
            ))),
            None => Err(CallError::attribute_error(format!(
                "type object '{}' has no attribute '{name}'",
                self.qualname()
            ))),
        }
    }

    /// Create an instance, running `__init__` when one resolves
    pub fn instantiate(&self, args: CallArgs) -> Result<Value, CallError> {
        let instance = Instance::new(self.clone());
        if let Some(init) = self.lookup("__init__").as_ref().and_then(Attribute::function) {
            let _ = init.call(args.bind_first(Value::Instance(instance.clone())))?;
        }
        Ok(Value::Instance(instance))
    }
}

/// Builder for [`ClassObject`]
#[derive(Debug)]
pub struct ClassBuilder {
    module: String,
    qualname: String,
    bases: Vec<ClassObject>,
    dict: Vec<(String, Attribute)>,
}

impl ClassBuilder {
    /// Add a base class
    #[must_use]
    pub fn base(mut self, base: ClassObject) -> Self {
        self.bases.push(base);
        self
    }

    /// Add an arbitrary attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.dict.push((name.into(), attribute));
        self
    }

    /// Define a plain method
    #[must_use]
    pub fn method<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        let f = self.member_function(name, body);
        self.attr(name, Attribute::Function(f))
    }

    /// Define a classmethod
    #[must_use]
    pub fn classmethod<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        let f = self.member_function(name, body);
        self.attr(name, Attribute::ClassMethod(f))
    }

    /// Define a staticmethod
    #[must_use]
    pub fn staticmethod<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        let f = self.member_function(name, body);
        self.attr(name, Attribute::StaticMethod(f))
    }

    fn member_function<F>(&self, name: &str, body: F) -> FunctionObject
    where
        F: Fn(CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        FunctionObject::new(
            self.module.clone(),
            format!("{}.{name}", self.qualname),
            body,
        )
    }

    /// Build the class
    #[must_use]
    pub fn build(self) -> ClassObject {
        ClassObject(Arc::new(ClassInner {
            qualname: self.qualname,
            module: self.module,
            bases: self.bases,
            dict: RwLock::new(self.dict),
        }))
    }
}

/// An instance of a class
#[derive(Clone)]
pub struct Instance {
    class: ClassObject,
    fields: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.qualname())
            .finish()
    }
}

impl Instance {
    /// Create a bare instance without running `__init__`
    #[must_use]
    pub fn new(class: ClassObject) -> Self {
        Self {
            class,
            fields: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// The instance's class
    #[must_use]
    pub fn class(&self) -> &ClassObject {
        &self.class
    }

    /// Check whether two handles refer to one instance
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }

    /// Read a field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.lock().get(name).cloned()
    }

    /// Write a field
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        let _ = self.fields.lock().insert(name.into(), value.into());
    }

    /// Call a method reached through this instance
    ///
    /// Plain methods receive the instance first, classmethods the
    /// instance's class, staticmethods nothing.
    pub fn call_method(&self, name: &str, args: CallArgs) -> Result<Value, CallError> {
        match self.class.lookup(name) {
            Some(Attribute::Function(f)) => f.call(args.bind_first(Value::Instance(self.clone()))),
            Some(Attribute::ClassMethod(f)) => {
                f.call(args.bind_first(Value::Class(self.class.clone())))
            }
            Some(Attribute::StaticMethod(f)) => f.call(args),
            Some(Attribute::Class(class)) => class.instantiate(args),
            Some(Attribute::Value(_)) => Err(CallError::type_error(format!(
                "'{}.{name}' is not callable",
                self.class.qualname()
            ))),
            None => Err(CallError::attribute_error(format!(
                "'{}' object has no attribute '{name}'",
                self.class.qualname()
            ))),
        }
    }
}
