//! Parser for D-Bus introspection data.
//!
//! The parser is permissive: documents which are empty, malformed, or which
//! describe something else entirely produce empty results rather than errors,
//! since introspection data is frequently produced by imperfect remote
//! implementations. Irregularities are reported through [`tracing`].
//!
//! ```
//! use dbus_manager_xml::{parse_interface, Access};
//!
//! let interface = parse_interface(r#"
//! <node>
//!   <interface name="org.example.Counter">
//!     <method name="Add">
//!       <arg name="amount" type="u"/>
//!       <arg name="total" type="u" direction="out"/>
//!     </method>
//!     <signal name="Changed">
//!       <arg type="u"/>
//!     </signal>
//!     <property name="Total" type="u" access="read"/>
//!   </interface>
//! </node>
//! "#);
//!
//! assert_eq!(interface.methods["Add"].inputs[0].ty, "u");
//! assert_eq!(interface.signals["Changed"].outputs.len(), 1);
//! assert_eq!(interface.properties["Total"].access, Access::Read);
//! ```

#[cfg(test)]
mod tests;

pub use self::elements::{
    Access, Annotation, Annotations, Argument, Interface, Interfaces, Method, Object, Property,
    Signal, SourceLocation,
};
mod elements;

pub use self::parser::{parse_interface, parse_interfaces, parse_object};
mod parser;

pub mod signature;
