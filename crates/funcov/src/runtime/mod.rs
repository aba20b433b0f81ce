//! Embeddable Object Model
//!
//! Rust has no runtime reflection, so the project under measurement is
//! described to funcov as a small object model: modules bind functions and
//! classes, classes hold plain functions, classmethods and staticmethods,
//! and every call goes through [`FunctionObject::call`], which maintains the
//! thread-local call-context stack in [`frames`].
//!
//! ```text
//! ModuleObject ──binds──► FunctionObject ──call──► frames::enter ─► observer ─► body
//!       │                        ▲
//!       └──binds──► ClassObject ─┘ (Function | ClassMethod | StaticMethod)
//! ```

mod class;
pub mod frames;
mod function;
mod module;
mod value;

pub use class::{Attribute, ClassBuilder, ClassObject, Instance};
pub use frames::{Frame, FrameGuard, FrameKind};
pub use function::{
    CallObserver, FunctionBody, FunctionBuilder, FunctionId, FunctionObject, InstallError,
    Location, Signature,
};
pub use module::{Binding, ModuleBuilder, ModuleObject};
pub use value::{CallArgs, CallError, Value};
