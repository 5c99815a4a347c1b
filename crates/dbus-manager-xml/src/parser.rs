use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use xmlparser::{ElementEnd, Token};

use crate::signature;
use crate::{
    Access, Annotation, Annotations, Argument, Interface, Interfaces, Method, Object, Property,
    Signal, SourceLocation,
};

/// Parse an introspection document into the object it describes.
///
/// The document is expected to have a `<node>` root, although a bare
/// `<interface>` root is accepted as well. Any other root yields an object
/// without interfaces or children.
///
/// # Examples
///
/// ```
/// use dbus_manager_xml::parse_object;
///
/// let object = parse_object(
///     r#"<node><interface name="org.example.Foo"/><node name="child"/></node>"#,
///     "org.example",
///     "/",
/// );
///
/// assert_eq!(object.interfaces, ["org.example.Foo"]);
/// assert_eq!(object.children, ["child"]);
/// ```
pub fn parse_object(xml: &str, service: &str, path: &str) -> Object {
    let parsed = parse(xml);

    Object {
        service: service.to_owned(),
        path: path.to_owned(),
        interfaces: parsed.names,
        children: parsed.children,
    }
}

/// Parse every interface declared in an introspection document.
///
/// # Examples
///
/// ```
/// use dbus_manager_xml::parse_interfaces;
///
/// let interfaces = parse_interfaces(
///     r#"<node><interface name="b"/><interface name="a"/></node>"#,
/// );
///
/// assert_eq!(interfaces.keys().collect::<Vec<_>>(), ["a", "b"]);
/// ```
pub fn parse_interfaces(xml: &str) -> Interfaces {
    parse(xml).interfaces
}

/// Parse a single interface out of an introspection document.
///
/// If the document declares several interfaces, the one with the lowest name
/// is returned. If it declares none, an empty interface is returned.
///
/// # Examples
///
/// ```
/// use dbus_manager_xml::parse_interface;
///
/// let interface = parse_interface(
///     r#"<node><interface name="org.example.Foo"><method name="Bar"/></interface></node>"#,
/// );
///
/// assert_eq!(interface.name, "org.example.Foo");
/// assert!(interface.methods.contains_key("Bar"));
/// ```
pub fn parse_interface(xml: &str) -> Interface {
    let Some((_, interface)) = parse_interfaces(xml).into_iter().next() else {
        return Interface::default();
    };

    Arc::try_unwrap(interface).unwrap_or_else(|interface| Interface::clone(&interface))
}

#[derive(Default)]
struct Parsed {
    interfaces: Interfaces,
    names: Vec<String>,
    children: Vec<String>,
}

impl Parsed {
    fn insert_interface(&mut self, interface: Interface) {
        if !self.names.contains(&interface.name) {
            self.names.push(interface.name.clone());
        }

        if self.interfaces.contains_key(&interface.name) {
            tracing::debug!(interface = %interface.name, "Duplicate interface replaces earlier declaration");
        }

        self.interfaces
            .insert(interface.name.clone(), Arc::new(interface));
    }
}

fn parse(xml: &str) -> Parsed {
    let offset = declaration_end(xml);
    let body = &xml[offset..];

    let mut parsed = Parsed::default();
    let mut stack = Vec::<State<'_>>::new();

    for token in xmlparser::Tokenizer::from(body) {
        let token = match token {
            Ok(token) => token,
            Err(error) => {
                tracing::debug!(%error, "Stopped parsing malformed introspection data");
                break;
            }
        };

        match token {
            Token::ElementStart {
                prefix,
                local,
                span,
            } => {
                let state = if !prefix.as_str().is_empty() {
                    State::Skip
                } else {
                    match (stack.last(), local.as_str()) {
                        (None, "node") => State::Root,
                        (Some(State::Root), "node") => State::Child(None),
                        (None | Some(State::Root), "interface") => {
                            State::Interface(InterfaceBuilder::new(span.start()))
                        }
                        (Some(State::Interface(..)), "method") => {
                            State::Method(MethodBuilder::default())
                        }
                        (Some(State::Interface(..)), "signal") => {
                            State::Signal(SignalBuilder::default())
                        }
                        (Some(State::Interface(..)), "property") => {
                            State::Property(PropertyBuilder::default())
                        }
                        (Some(State::Method(..)), "arg") => {
                            State::Argument(ArgumentBuilder::default())
                        }
                        (Some(State::Signal(..)), "arg") => {
                            State::Argument(ArgumentBuilder::default())
                        }
                        (
                            Some(
                                State::Interface(..)
                                | State::Method(..)
                                | State::Signal(..)
                                | State::Property(..),
                            ),
                            "annotation",
                        ) => State::Annotation(AnnotationBuilder::new(source_location(
                            xml,
                            offset + span.start(),
                        ))),
                        (_, element) => {
                            tracing::trace!(element, "Skipping unsupported element");
                            State::Skip
                        }
                    }
                };

                stack.push(state);
            }
            Token::Attribute {
                prefix,
                local,
                value,
                ..
            } => {
                if !prefix.as_str().is_empty() {
                    continue;
                }

                if let Some(state) = stack.last_mut() {
                    state.attribute(local.as_str(), unescape(value.as_str()));
                }
            }
            Token::ElementEnd { end, span } => {
                if let ElementEnd::Open = end {
                    continue;
                }

                let Some(top) = stack.pop() else {
                    continue;
                };

                let end = span.end();

                match (top, stack.last_mut()) {
                    (State::Child(Some(name)), Some(State::Root)) => {
                        parsed.children.push(name.into_owned());
                    }
                    (State::Child(None), Some(State::Root)) => {
                        tracing::trace!("Ignoring child node without a name");
                    }
                    (State::Interface(builder), None | Some(State::Root)) => {
                        let source = &body[builder.start..end];

                        if let Some(interface) = builder.build(source) {
                            parsed.insert_interface(interface);
                        }
                    }
                    (State::Method(builder), Some(State::Interface(interface))) => {
                        if let Some(method) = builder.build() {
                            interface.methods.insert(method.name.clone(), method);
                        }
                    }
                    (State::Signal(builder), Some(State::Interface(interface))) => {
                        if let Some(signal) = builder.build() {
                            interface.signals.insert(signal.name.clone(), signal);
                        }
                    }
                    (State::Property(builder), Some(State::Interface(interface))) => {
                        if let Some(property) = builder.build() {
                            interface.properties.insert(property.name.clone(), property);
                        }
                    }
                    (State::Argument(builder), Some(State::Method(method))) => {
                        builder.build_method_argument(method);
                    }
                    (State::Argument(builder), Some(State::Signal(signal))) => {
                        builder.build_signal_argument(signal);
                    }
                    (State::Annotation(builder), Some(parent)) => {
                        if let Some(annotations) = parent.annotations_mut() {
                            builder.build(annotations);
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    parsed
}

/// Find the end of a leading `<?xml ...?>` declaration.
///
/// Declarations are skipped by hand since introspection data in the wild
/// carries attributes in them which a strict tokenizer rejects.
fn declaration_end(xml: &str) -> usize {
    let trimmed = xml.trim_start();

    if !trimmed.starts_with("<?xml") {
        return 0;
    }

    match trimmed.find("?>") {
        Some(end) => xml.len() - trimmed.len() + end + 2,
        None => 0,
    }
}

fn source_location(xml: &str, pos: usize) -> SourceLocation {
    let head = &xml[..pos];

    let (line, start) = match head.rfind('\n') {
        Some(index) => (head.matches('\n').count() + 1, index + 1),
        None => (1, 0),
    };

    SourceLocation {
        line,
        column: head[start..].chars().count() + 1,
    }
}

/// Decode predefined entities and character references in an attribute
/// value.
fn unescape(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(index) = rest.find('&') {
        out.push_str(&rest[..index]);
        rest = &rest[index..];

        let decoded = rest.find(';').and_then(|end| {
            let c = match &rest[1..end] {
                "lt" => '<',
                "gt" => '>',
                "amp" => '&',
                "quot" => '"',
                "apos" => '\'',
                reference => {
                    let code = if let Some(hex) = reference.strip_prefix("#x") {
                        u32::from_str_radix(hex, 16).ok()?
                    } else if let Some(dec) = reference.strip_prefix('#') {
                        dec.parse().ok()?
                    } else {
                        return None;
                    };

                    char::from_u32(code)?
                }
            };

            Some((c, end + 1))
        });

        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    Cow::Owned(out)
}

fn check_signature(ty: &str, element: &str, name: &str) {
    if let Err(error) = signature::validate_single(ty) {
        tracing::warn!(element, name, ty, %error, "Invalid D-Bus type signature");
    }
}

#[derive(Debug)]
enum State<'a> {
    /// The root `node` element.
    Root,
    /// A child `node` element.
    Child(Option<Cow<'a, str>>),
    Interface(InterfaceBuilder<'a>),
    Method(MethodBuilder<'a>),
    Signal(SignalBuilder<'a>),
    Property(PropertyBuilder<'a>),
    Argument(ArgumentBuilder<'a>),
    Annotation(AnnotationBuilder<'a>),
    /// An element which is ignored along with everything inside of it.
    Skip,
}

impl<'a> State<'a> {
    fn attribute(&mut self, name: &str, value: Cow<'a, str>) {
        match (self, name) {
            (State::Child(child), "name") => *child = Some(value),
            (State::Interface(builder), "name") => builder.name = Some(value),
            (State::Method(builder), "name") => builder.name = Some(value),
            (State::Signal(builder), "name") => builder.name = Some(value),
            (State::Property(builder), "name") => builder.name = Some(value),
            (State::Property(builder), "type") => builder.ty = Some(value),
            (State::Property(builder), "access") => builder.access = Some(value),
            (State::Argument(builder), "name") => builder.name = Some(value),
            (State::Argument(builder), "type") => builder.ty = Some(value),
            (State::Argument(builder), "direction") => builder.direction = Some(value),
            (State::Annotation(builder), "name") => builder.name = Some(value),
            (State::Annotation(builder), "value") => builder.value = Some(value),
            _ => {}
        }
    }

    fn annotations_mut(&mut self) -> Option<&mut Annotations> {
        match self {
            State::Interface(builder) => Some(&mut builder.annotations),
            State::Method(builder) => Some(&mut builder.annotations),
            State::Signal(builder) => Some(&mut builder.annotations),
            State::Property(builder) => Some(&mut builder.annotations),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct InterfaceBuilder<'a> {
    /// Offset of the start tag.
    start: usize,
    name: Option<Cow<'a, str>>,
    annotations: Annotations,
    methods: BTreeMap<String, Method>,
    signals: BTreeMap<String, Signal>,
    properties: BTreeMap<String, Property>,
}

impl InterfaceBuilder<'_> {
    fn new(start: usize) -> Self {
        Self {
            start,
            name: None,
            annotations: Annotations::new(),
            methods: BTreeMap::new(),
            signals: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    fn build(self, source: &str) -> Option<Interface> {
        let Some(name) = non_empty(self.name) else {
            tracing::warn!("Dropping interface without a name");
            return None;
        };

        Some(Interface {
            name: name.into_owned(),
            introspection: source.to_owned(),
            annotations: self.annotations,
            methods: self.methods,
            signals: self.signals,
            properties: self.properties,
        })
    }
}

#[derive(Debug, Default)]
struct MethodBuilder<'a> {
    name: Option<Cow<'a, str>>,
    inputs: Vec<Argument>,
    outputs: Vec<Argument>,
    annotations: Annotations,
}

impl MethodBuilder<'_> {
    fn build(self) -> Option<Method> {
        let Some(name) = non_empty(self.name) else {
            tracing::warn!("Dropping method without a name");
            return None;
        };

        Some(Method {
            name: name.into_owned(),
            inputs: self.inputs.into(),
            outputs: self.outputs.into(),
            annotations: self.annotations,
        })
    }
}

#[derive(Debug, Default)]
struct SignalBuilder<'a> {
    name: Option<Cow<'a, str>>,
    outputs: Vec<Argument>,
    annotations: Annotations,
}

impl SignalBuilder<'_> {
    fn build(self) -> Option<Signal> {
        let Some(name) = non_empty(self.name) else {
            tracing::warn!("Dropping signal without a name");
            return None;
        };

        Some(Signal {
            name: name.into_owned(),
            outputs: self.outputs.into(),
            annotations: self.annotations,
        })
    }
}

#[derive(Debug, Default)]
struct PropertyBuilder<'a> {
    name: Option<Cow<'a, str>>,
    ty: Option<Cow<'a, str>>,
    access: Option<Cow<'a, str>>,
    annotations: Annotations,
}

impl PropertyBuilder<'_> {
    fn build(self) -> Option<Property> {
        let Some(name) = non_empty(self.name) else {
            tracing::warn!("Dropping property without a name");
            return None;
        };

        let Some(ty) = self.ty else {
            tracing::warn!(property = %name, "Dropping property without a type");
            return None;
        };

        let Some(access) = self.access.as_deref().and_then(Access::from_attribute) else {
            tracing::warn!(property = %name, access = ?self.access, "Dropping property with invalid access");
            return None;
        };

        check_signature(&ty, "property", &name);

        Some(Property {
            name: name.into_owned(),
            ty: ty.into_owned(),
            access,
            annotations: self.annotations,
        })
    }
}

#[derive(Debug, Default)]
struct ArgumentBuilder<'a> {
    name: Option<Cow<'a, str>>,
    ty: Option<Cow<'a, str>>,
    direction: Option<Cow<'a, str>>,
}

impl ArgumentBuilder<'_> {
    /// Arguments of a method are inputs unless stated otherwise.
    fn build_method_argument(self, method: &mut MethodBuilder<'_>) {
        let context = method.name.as_deref().unwrap_or_default();

        let outputs = match self.direction.as_deref() {
            None | Some("in") => false,
            Some("out") => true,
            Some(other) => {
                tracing::warn!(method = context, direction = other, "Dropping argument with invalid direction");
                return;
            }
        };

        let Some(argument) = self.build(context) else {
            return;
        };

        if outputs {
            method.outputs.push(argument);
        } else {
            method.inputs.push(argument);
        }
    }

    /// Arguments of a signal are always outputs.
    fn build_signal_argument(self, signal: &mut SignalBuilder<'_>) {
        let context = signal.name.as_deref().unwrap_or_default();

        match self.direction.as_deref() {
            None | Some("out") => {}
            Some(other) => {
                tracing::warn!(signal = context, direction = other, "Dropping signal argument with invalid direction");
                return;
            }
        }

        if let Some(argument) = self.build(context) {
            signal.outputs.push(argument);
        }
    }

    fn build(self, context: &str) -> Option<Argument> {
        let Some(ty) = self.ty else {
            tracing::warn!(member = context, "Dropping argument without a type");
            return None;
        };

        check_signature(&ty, "arg", self.name.as_deref().unwrap_or(context));

        Some(Argument {
            name: self.name.map(Cow::into_owned),
            ty: ty.into_owned(),
        })
    }
}

#[derive(Debug)]
struct AnnotationBuilder<'a> {
    location: SourceLocation,
    name: Option<Cow<'a, str>>,
    value: Option<Cow<'a, str>>,
}

impl AnnotationBuilder<'_> {
    fn new(location: SourceLocation) -> Self {
        Self {
            location,
            name: None,
            value: None,
        }
    }

    fn build(self, annotations: &mut Annotations) {
        let Some(name) = non_empty(self.name) else {
            tracing::warn!(location = %self.location, "Dropping annotation without a name");
            return;
        };

        let name = name.into_owned();

        let annotation = Annotation {
            location: self.location,
            name: name.clone(),
            value: self.value.map(Cow::into_owned).unwrap_or_default(),
        };

        annotations.insert(name, annotation);
    }
}

fn non_empty(value: Option<Cow<'_, str>>) -> Option<Cow<'_, str>> {
    value.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod unit {
    use super::{declaration_end, source_location, unescape};
    use crate::SourceLocation;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("plain"), "plain");
        assert_eq!(unescape("a &amp; b"), "a & b");
        assert_eq!(unescape("&lt;&gt;&quot;&apos;"), "<>\"'");
        assert_eq!(unescape("&#65;&#x42;"), "AB");
        assert_eq!(unescape("&unknown; &"), "&unknown; &");
    }

    #[test]
    fn test_declaration_end() {
        assert_eq!(declaration_end("<node/>"), 0);
        assert_eq!(declaration_end("  <?xml version=\"1.0\" ?><node/>"), 24);
        assert_eq!(declaration_end("<?xml broken"), 0);
    }

    #[test]
    fn test_source_location() {
        let xml = "<node>\n  <interface>";
        assert_eq!(
            source_location(xml, 9),
            SourceLocation { line: 2, column: 3 }
        );
        assert_eq!(source_location(xml, 0), SourceLocation { line: 1, column: 1 });
    }
}
