use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Annotations attached to an element, keyed by annotation name.
pub type Annotations = BTreeMap<String, Annotation>;

/// Interfaces keyed by interface name.
pub type Interfaces = BTreeMap<String, Arc<Interface>>;

/// A single D-Bus object as described by one introspection document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Object {
    /// The service the object was introspected from.
    pub service: String,
    /// The object path of the node.
    pub path: String,
    /// Names of the interfaces implemented by the object, in order of first
    /// appearance. Each name is a key into the parsed [`Interfaces`].
    pub interfaces: Vec<String>,
    /// Relative names of the child objects.
    pub children: Vec<String>,
}

/// A single interface.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Interface {
    /// The name of the interface.
    pub name: String,
    /// The verbatim XML the interface was parsed from, from its start tag
    /// through its end tag.
    pub introspection: String,
    /// Annotations on the interface.
    pub annotations: Annotations,
    /// Methods associated with the interface.
    pub methods: BTreeMap<String, Method>,
    /// Signals associated with the interface.
    pub signals: BTreeMap<String, Signal>,
    /// Properties associated with the interface.
    pub properties: BTreeMap<String, Property>,
}

/// A method argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    /// The name of the argument.
    pub name: Option<String>,
    /// The type signature of the argument.
    pub ty: String,
}

impl Argument {
    /// Construct a new argument.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbus_manager_xml::Argument;
    ///
    /// let arg = Argument::new("s", Some("name"));
    /// assert_eq!(arg.ty, "s");
    /// assert_eq!(arg.name.as_deref(), Some("name"));
    /// ```
    pub fn new(ty: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            name: name.map(String::from),
            ty: ty.into(),
        }
    }
}

/// A method.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Method {
    /// The name of the method.
    pub name: String,
    /// Input arguments in declaration order.
    pub inputs: Box<[Argument]>,
    /// Output arguments in declaration order.
    pub outputs: Box<[Argument]>,
    /// Annotations on the method.
    pub annotations: Annotations,
}

/// A signal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Signal {
    /// The name of the signal.
    pub name: String,
    /// Arguments carried by the signal in declaration order.
    pub outputs: Box<[Argument]>,
    /// Annotations on the signal.
    pub annotations: Annotations,
}

/// Access mode of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// `access="read"`.
    Read,
    /// `access="write"`.
    Write,
    /// `access="readwrite"`.
    ReadWrite,
}

impl Access {
    /// Parse the value of an `access` attribute.
    ///
    /// # Examples
    ///
    /// ```
    /// use dbus_manager_xml::Access;
    ///
    /// assert_eq!(Access::from_attribute("readwrite"), Some(Access::ReadWrite));
    /// assert_eq!(Access::from_attribute("sometimes"), None);
    /// ```
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value {
            "read" => Some(Access::Read),
            "write" => Some(Access::Write),
            "readwrite" => Some(Access::ReadWrite),
            _ => None,
        }
    }

    /// Test if the property can be read.
    #[inline]
    pub fn is_readable(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    /// Test if the property can be written.
    #[inline]
    pub fn is_writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

impl fmt::Display for Access {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "write"),
            Access::ReadWrite => write!(f, "readwrite"),
        }
    }
}

/// A property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// The name of the property.
    pub name: String,
    /// The type signature of the property.
    pub ty: String,
    /// How the property may be accessed.
    pub access: Access,
    /// Annotations on the property.
    pub annotations: Annotations,
}

/// Where an element started in the source document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// One-based line.
    pub line: usize,
    /// One-based column, counted in characters.
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An annotation.
///
/// The location is diagnostic only and does not take part in comparisons.
#[derive(Debug, Clone)]
pub struct Annotation {
    /// Where the annotation was declared.
    pub location: SourceLocation,
    /// The name of the annotation.
    pub name: String,
    /// The value of the annotation.
    pub value: String,
}

impl Annotation {
    /// Construct an annotation without a known location.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            location: SourceLocation::default(),
            name: name.into(),
            value: value.into(),
        }
    }
}

impl PartialEq for Annotation {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

impl Eq for Annotation {}
