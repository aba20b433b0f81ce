//! Module objects.

use super::{CallArgs, CallError, ClassObject, FunctionObject, Value};
use parking_lot::RwLock;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A name bound in a module's namespace
#[derive(Debug, Clone)]
pub enum Binding {
    /// A function (defined here or imported)
    Function(FunctionObject),
    /// A class (defined here or imported)
    Class(ClassObject),
    /// Any other value
    Value(Value),
}

struct ModuleInner {
    name: String,
    file: Option<PathBuf>,
    bindings: RwLock<Vec<(String, Binding)>>,
}

/// A shared module object
#[derive(Clone)]
pub struct ModuleObject(Arc<ModuleInner>);

impl fmt::Debug for ModuleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleObject")
            .field("name", &self.0.name)
            .field("file", &self.0.file)
            .field("bindings", &self.0.bindings.read().len())
            .finish()
    }
}

impl ModuleObject {
    /// Start building a module named `name` (dotted path)
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder {
            name: name.into(),
            file: None,
            bindings: Vec::new(),
        }
    }

    /// Dotted module name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Source file, if the module was loaded from one
    #[must_use]
    pub fn file(&self) -> Option<&Path> {
        self.0.file.as_deref()
    }

    /// All bindings, in definition order
    #[must_use]
    pub fn bindings(&self) -> Vec<(String, Binding)> {
        self.0.bindings.read().clone()
    }

    /// Look up a binding
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Binding> {
        self.0
            .bindings
            .read()
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, binding)| binding.clone())
    }

    /// Look up a bound class
    #[must_use]
    pub fn class(&self, name: &str) -> Option<ClassObject> {
        match self.get(name) {
            Some(Binding::Class(class)) => Some(class),
            _ => None,
        }
    }

    /// Look up a bound function
    #[must_use]
    pub fn function(&self, name: &str) -> Option<FunctionObject> {
        match self.get(name) {
            Some(Binding::Function(f)) => Some(f),
            _ => None,
        }
    }

    /// Bind or rebind a name (e.g. an import performed after loading)
    pub fn bind(&self, name: impl Into<String>, binding: Binding) {
        let name = name.into();
        let mut bindings = self.0.bindings.write();
        match bindings.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = binding,
            None => bindings.push((name, binding)),
        }
    }

    /// Call a bound name: functions are invoked, classes instantiated
    pub fn call(&self, name: &str, args: CallArgs) -> Result<Value, CallError> {
        match self.get(name) {
            Some(Binding::Function(f)) => f.call(args),
            Some(Binding::Class(class)) => class.instantiate(args),
            Some(Binding::Value(_)) => Err(CallError::type_error(format!(
                "'{}.{name}' is not callable",
                self.name()
            ))),
            None => Err(CallError::attribute_error(format!(
                "module '{}' has no attribute '{name}'",
                self.name()
            ))),
        }
    }
}

/// Builder for [`ModuleObject`]
#[derive(Debug)]
pub struct ModuleBuilder {
    name: String,
    file: Option<PathBuf>,
    bindings: Vec<(String, Binding)>,
}

impl ModuleBuilder {
    /// Set the source file
    #[must_use]
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Bind an arbitrary name
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.bindings.push((name.into(), binding));
        self
    }

    /// Define a module-level function bound under its own name
    #[must_use]
    pub fn def<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(CallArgs) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        let f = FunctionObject::new(self.name.clone(), name, body);
        self.function(f)
    }

    /// Bind a function object under its own name
    #[must_use]
    pub fn function(self, f: FunctionObject) -> Self {
        let name = f.name().to_string();
        self.bind(name, Binding::Function(f))
    }

    /// Bind a class object under its own name
    #[must_use]
    pub fn class(self, class: ClassObject) -> Self {
        let name = class.name().to_string();
        self.bind(name, Binding::Class(class))
    }

    /// Build the module
    #[must_use]
    pub fn build(self) -> ModuleObject {
        ModuleObject(Arc::new(ModuleInner {
            name: self.name,
            file: self.file,
            bindings: RwLock::new(self.bindings),
        }))
    }
}
