//! Reflection Capability
//!
//! Discovery only sees the target project through [`Reflect`]: a namespace
//! lists the members it defines itself. Imported names and inherited
//! attributes never show up, which is what keeps aliases from being counted
//! twice. [`CallableKind::detect`] then classifies each member with one
//! strategy per kind.

use crate::runtime::{Attribute, Binding, ClassObject, FunctionObject, ModuleObject};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of namespace a member was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Module level
    Module,
    /// Class body
    Class,
}

/// A member defined in a namespace
#[derive(Debug, Clone)]
pub enum Member {
    /// Plain function
    Function(FunctionObject),
    /// Function declared as a classmethod
    ClassMethod(FunctionObject),
    /// Function declared as a staticmethod
    StaticMethod(FunctionObject),
    /// Class defined in this namespace
    Class(ClassObject),
}

impl Member {
    /// The function behind a function-like member
    #[must_use]
    pub const fn function(&self) -> Option<&FunctionObject> {
        match self {
            Self::Function(f) | Self::ClassMethod(f) | Self::StaticMethod(f) => Some(f),
            Self::Class(_) => None,
        }
    }
}

/// A namespace that can enumerate what it defines
pub trait Reflect {
    /// Where members of this namespace live
    fn owner(&self) -> Owner;

    /// Dotted module name
    fn module_name(&self) -> &str;

    /// Members defined (not imported, not inherited) here, in order
    fn defined_members(&self) -> Vec<(String, Member)>;
}

impl Reflect for ModuleObject {
    fn owner(&self) -> Owner {
        Owner::Module
    }

    fn module_name(&self) -> &str {
        self.name()
    }

    fn defined_members(&self) -> Vec<(String, Member)> {
        self.bindings()
            .into_iter()
            .filter_map(|(name, binding)| match binding {
                Binding::Function(f) if f.module() == self.name() => {
                    Some((name, Member::Function(f)))
                }
                Binding::Class(class) if class.module() == self.name() => {
                    Some((name, Member::Class(class)))
                }
                _ => None,
            })
            .collect()
    }
}

impl Reflect for ClassObject {
    fn owner(&self) -> Owner {
        Owner::Class
    }

    fn module_name(&self) -> &str {
        self.module()
    }

    fn defined_members(&self) -> Vec<(String, Member)> {
        let nested_prefix = format!("{}.", self.qualname());
        let here = |module: &str| module == self.module();
        self.own_attributes()
            .into_iter()
            .filter_map(|(name, attribute)| match attribute {
                Attribute::Function(f) if here(f.module()) => Some((name, Member::Function(f))),
                Attribute::ClassMethod(f) if here(f.module()) => {
                    Some((name, Member::ClassMethod(f)))
                }
                Attribute::StaticMethod(f) if here(f.module()) => {
                    Some((name, Member::StaticMethod(f)))
                }
                Attribute::Class(class)
                    if here(class.module()) && class.qualname().starts_with(&nested_prefix) =>
                {
                    Some((name, Member::Class(class)))
                }
                _ => None,
            })
            .collect()
    }
}

/// The kind of a discovered callable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallableKind {
    /// Module-level function
    Function,
    /// Plain function in a class body
    Method,
    /// Declared classmethod
    ClassMethod,
    /// Declared staticmethod
    StaticMethod,
}

type Strategy = fn(Owner, &Member) -> bool;

const STRATEGIES: [(CallableKind, Strategy); 4] = [
    (CallableKind::Function, |owner: Owner, member: &Member| {
        owner == Owner::Module && matches!(member, Member::Function(_))
    }),
    (CallableKind::Method, |owner: Owner, member: &Member| {
        owner == Owner::Class && matches!(member, Member::Function(_))
    }),
    (CallableKind::ClassMethod, |_: Owner, member: &Member| {
        matches!(member, Member::ClassMethod(_))
    }),
    (CallableKind::StaticMethod, |_: Owner, member: &Member| {
        matches!(member, Member::StaticMethod(_))
    }),
];

impl CallableKind {
    /// Classify a member; `None` for members that are not callables
    #[must_use]
    pub fn detect(owner: Owner, member: &Member) -> Option<Self> {
        STRATEGIES
            .iter()
            .find(|(_, strategy)| strategy(owner, member))
            .map(|(kind, _)| *kind)
    }

    /// Stable lowercase label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::ClassMethod => "classmethod",
            Self::StaticMethod => "staticmethod",
        }
    }
}

impl fmt::Display for CallableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
