//! Declaring parameters
//!
//! A config section implements [`ConfigSection`] and lists its parameters
//! in [`ConfigSection::declare`]:
//!
//! ```ignore
//! struct Ports {
//!     cmd: Param<u16>,
//! }
//!
//! impl ConfigSection for Ports {
//!     fn declare(&self, reg: &mut Registrar<'_>) {
//!         reg.add(ParamSpec::new("cmd", &self.cmd).help("Command port").cmdline("cmd_port"));
//!     }
//! }
//! ```
//!
//! The same `declare` serves registration with a container and template
//! synthesis, so it must not have side effects beyond calling the
//! registrar.

use std::sync::Arc;

use paramtree_meta::{Metadata, ParameterSource, Restriction};

use crate::backend::{join_name, RegistrationBackend};
use crate::error::{Error, Result};
use crate::slot::{Param, Slot};
use crate::subconfig::{SubconfigHandle, SubconfigMap};
use crate::value::{Binding, ParamValue, SlotBinding};

/// A group of parameters under a common prefix.
pub trait ConfigSection: Send + Sync {
    fn declare(&self, registrar: &mut Registrar<'_>);
}

/// Declaration of one parameter, built fluently and passed to
/// [`Registrar::add`].
pub struct ParamSpec<T: ParamValue> {
    leaf: String,
    slot: Box<dyn Slot<T>>,
    help: String,
    default: Option<String>,
    suggested_reference: Option<String>,
    cmdline: Option<String>,
    optional: bool,
    restriction: Option<Restriction>,
    deprecated: Vec<String>,
    deprecated_prefix: Option<String>,
    pure_cmdline: bool,
    save: bool,
    comment: Option<String>,
}

impl<T: ParamValue> ParamSpec<T> {
    pub fn new(leaf: &str, param: &Param<T>) -> Self {
        Self::with_slot(leaf, param.slot())
    }

    /// Declare against any storage implementing [`Slot`].
    pub fn with_slot(leaf: &str, slot: impl Slot<T> + 'static) -> Self {
        Self {
            leaf: leaf.to_string(),
            slot: Box::new(slot),
            help: String::new(),
            default: None,
            suggested_reference: None,
            cmdline: None,
            optional: false,
            restriction: None,
            deprecated: Vec::new(),
            deprecated_prefix: None,
            pure_cmdline: false,
            save: true,
            comment: None,
        }
    }

    pub fn help(mut self, text: &str) -> Self {
        self.help = text.to_string();
        self
    }

    /// Value proposed for a mandatory parameter. Whether it is used
    /// depends on the container's checking mode.
    pub fn suggested(mut self, value: T) -> Self {
        self.default = Some(value.format());
        self
    }

    pub fn suggested_ref(mut self, target: &str) -> Self {
        self.suggested_reference = Some(target.to_string());
        self
    }

    /// The parameter may be absent; `default` applies then.
    pub fn optional(mut self, default: T) -> Self {
        self.optional = true;
        self.default = Some(default.format());
        self
    }

    /// Accept `-switch value` on the command line.
    pub fn cmdline(mut self, switch: &str) -> Self {
        self.cmdline = Some(switch.to_string());
        self
    }

    /// Only the command line may set the value; files are ignored and
    /// the parameter is never saved.
    pub fn pure_cmdline(mut self, default: T) -> Self {
        self.pure_cmdline = true;
        self.save = false;
        self.default = Some(default.format());
        self
    }

    pub fn restriction(mut self, restriction: Restriction) -> Self {
        self.restriction = Some(restriction);
        self
    }

    /// Former leaf name of this parameter.
    pub fn deprecated(mut self, old_leaf: &str) -> Self {
        self.deprecated.push(old_leaf.to_string());
        self
    }

    /// Former prefix of this parameter.
    pub fn deprecated_prefix(mut self, prefix: &str) -> Self {
        self.deprecated_prefix = Some(prefix.to_string());
        self
    }

    pub fn no_save(mut self) -> Self {
        self.save = false;
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.comment = Some(text.to_string());
        self
    }
}

/// One registered parameter as the container keeps it.
pub(crate) struct Registration {
    pub(crate) metadata: Metadata,
    pub(crate) deprecated_names: Vec<String>,
    pub(crate) pure_cmdline: bool,
    pub(crate) save: bool,
    pub(crate) binding: Box<dyn Binding>,
    pub(crate) backend: Arc<dyn RegistrationBackend>,
    pub(crate) source: ParameterSource,
    /// Value as written by the last refresh, in config text form.
    pub(crate) refreshed: Option<String>,
    /// The last refresh found a value that failed conversion or its
    /// restriction and left the slot as it was.
    pub(crate) rejected: bool,
}

impl Registration {
    pub(crate) fn name(&self) -> &str {
        &self.metadata.name
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.binding.is_alive()
    }
}

/// Receiver of declarations: the container, or the template synthesizer.
pub(crate) trait RegistrationSink {
    fn parameter(&mut self, registration: Registration) -> Result<()>;

    fn subconfig(
        &mut self,
        prefix: String,
        handle: Arc<dyn SubconfigHandle>,
        backend: Arc<dyn RegistrationBackend>,
    ) -> Result<()>;
}

/// Collects a section's declarations under the current prefix.
pub struct Registrar<'r> {
    sink: &'r mut dyn RegistrationSink,
    backend: Arc<dyn RegistrationBackend>,
    prefix: String,
    deprecated_prefix: Option<String>,
    error: Option<Error>,
}

impl<'r> Registrar<'r> {
    pub(crate) fn new(
        sink: &'r mut dyn RegistrationSink,
        backend: Arc<dyn RegistrationBackend>,
        prefix: &str,
    ) -> Self {
        Self {
            sink,
            backend,
            prefix: prefix.to_string(),
            deprecated_prefix: None,
            error: None,
        }
    }

    /// Dotted prefix parameters are currently declared under.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Former prefix of every parameter declared from now on.
    pub fn set_deprecated_prefix(&mut self, prefix: &str) {
        self.deprecated_prefix = Some(prefix.to_string());
    }

    pub fn add<T: ParamValue>(&mut self, spec: ParamSpec<T>) {
        let name = join_name(&self.prefix, &spec.leaf);

        let mut metadata = Metadata::typed(&name, T::type_name());
        metadata.set_help(&spec.help);
        metadata.default_value = spec.default;
        metadata.suggested_reference = spec.suggested_reference;
        metadata.cmdline_switch = spec.cmdline;
        metadata.optional = spec.optional;
        metadata.restriction = spec.restriction;
        metadata.user_comment = spec.comment;

        let mut old_prefixes: Vec<&str> = Vec::new();
        for prefix in [spec.deprecated_prefix.as_deref(), self.deprecated_prefix.as_deref()]
            .into_iter()
            .flatten()
        {
            if !old_prefixes.contains(&prefix) {
                old_prefixes.push(prefix);
            }
        }
        let mut deprecated_names = Vec::new();
        for old_leaf in &spec.deprecated {
            deprecated_names.push(join_name(&self.prefix, old_leaf));
            for prefix in &old_prefixes {
                deprecated_names.push(join_name(prefix, old_leaf));
            }
        }
        for prefix in &old_prefixes {
            deprecated_names.push(join_name(prefix, &spec.leaf));
        }
        deprecated_names.extend(self.backend.deprecated_names(&self.prefix, &spec.leaf));
        let mut unique: Vec<String> = Vec::new();
        for old in deprecated_names {
            if old != name && !unique.contains(&old) {
                unique.push(old);
            }
        }

        let registration = Registration {
            metadata,
            deprecated_names: unique,
            pure_cmdline: spec.pure_cmdline,
            save: spec.save,
            binding: Box::new(SlotBinding::new(spec.slot)),
            backend: self.backend.clone(),
            source: ParameterSource::Unknown,
            refreshed: None,
            rejected: false,
        };
        if let Err(e) = self.sink.parameter(registration) {
            self.record(e);
        }
    }

    /// Declare a nested section under `prefix.name`.
    pub fn section<S: ConfigSection + ?Sized>(&mut self, name: &str, section: &S) {
        let inner_prefix = join_name(&self.prefix, name);
        let outer_prefix = std::mem::replace(&mut self.prefix, inner_prefix);
        let outer_deprecated = self.deprecated_prefix.clone();
        self.deprecated_prefix = outer_deprecated.as_deref().map(|p| join_name(p, name));

        section.declare(self);

        self.prefix = outer_prefix;
        self.deprecated_prefix = outer_deprecated;
    }

    /// Declare a map of subconfig instances living under `prefix.name`.
    pub fn subconfig<S>(&mut self, name: &str, map: &SubconfigMap<S>)
    where
        S: ConfigSection + Default + 'static,
    {
        let prefix = join_name(&self.prefix, name);
        if let Err(e) = self.sink.subconfig(prefix, map.handle(), self.backend.clone()) {
            self.record(e);
        }
    }

    fn record(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// First error any declaration produced.
    pub(crate) fn finish(self) -> Result<()> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
