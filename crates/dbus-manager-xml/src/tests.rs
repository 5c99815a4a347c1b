use std::collections::BTreeMap;
use std::thread;

use crate::{
    parse_interface, parse_interfaces, parse_object, Access, Annotation, Annotations, Argument,
    Method, Property, Signal, SourceLocation,
};

const DOCTYPE: &str = "<!DOCTYPE node PUBLIC \"-//freedesktop//DTD D-BUS Object Introspection 1.0//EN\"\n\"http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd\">\n";

const SIMPLE: &str = r#"
<!DOCTYPE node PUBLIC
    "-//freedesktop//DTD D-BUS Object Introspection 1.0//EN"
    "http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd" >
<node xmlns:doc="http://www.freedesktop.org/dbus/1.0/doc.dtd">
  <interface name="com.example.MyService1.InterestingInterface">
    <method name="AddContact">
      <arg name="name" direction="in" type="s">
        <doc:doc><doc:summary>Name of new contact</doc:summary></doc:doc>
      </arg>
      <arg name="email" direction="in" type="s">
        <doc:doc><doc:summary>E-mail address of new contact</doc:summary></doc:doc>
      </arg>
      <arg name="id" direction="out" type="u">
        <doc:doc><doc:summary>ID of newly added contact</doc:summary></doc:doc>
      </arg>
      <doc:doc>
        <doc:description>
          <doc:para>
            Adds a new contact to the address book with their name and
            e-mail address.
          </doc:para>
        </doc:description>
      </doc:doc>
    </method>
  </interface>
</node>
"#;

struct Case {
    name: &'static str,
    xml: &'static str,
    interfaces: usize,
    objects: usize,
    annotations: usize,
    introspection: &'static [&'static str],
}

const CASES: &[Case] = &[
    Case {
        name: "empty",
        xml: "",
        interfaces: 0,
        objects: 0,
        annotations: 0,
        introspection: &[],
    },
    Case {
        name: "junk",
        xml: "<junk/>",
        interfaces: 0,
        objects: 0,
        annotations: 0,
        introspection: &[],
    },
    Case {
        name: "interface-inside-junk",
        xml: r#"<junk><interface name="iface.iface1" /></junk>"#,
        interfaces: 0,
        objects: 0,
        annotations: 0,
        introspection: &[],
    },
    Case {
        name: "object-inside-junk",
        xml: r#"<junk><node name="obj1" /></junk>"#,
        interfaces: 0,
        objects: 0,
        annotations: 0,
        introspection: &[],
    },
    Case {
        name: "zero-interfaces",
        xml: "<node/>",
        interfaces: 0,
        objects: 0,
        annotations: 0,
        introspection: &[],
    },
    Case {
        name: "one-interface",
        xml: r#"<node><interface name="iface.iface1" /></node>"#,
        interfaces: 1,
        objects: 0,
        annotations: 0,
        introspection: &[r#"<interface name="iface.iface1" />"#],
    },
    Case {
        name: "two-interfaces",
        xml: r#"<node><interface name="iface.iface1" /><interface name="iface.iface2" /></node>"#,
        interfaces: 2,
        objects: 0,
        annotations: 0,
        introspection: &[
            r#"<interface name="iface.iface1" />"#,
            r#"<interface name="iface.iface2" />"#,
        ],
    },
    Case {
        name: "one-object",
        xml: r#"<node><node name="obj1"/></node>"#,
        interfaces: 0,
        objects: 1,
        annotations: 0,
        introspection: &[],
    },
    Case {
        name: "two-objects",
        xml: r#"<node><node name="obj1"/><node name="obj2"/></node>"#,
        interfaces: 0,
        objects: 2,
        annotations: 0,
        introspection: &[],
    },
    Case {
        name: "i1o1",
        xml: r#"<node><interface name="iface.iface1"/><node name="obj1"/></node>"#,
        interfaces: 1,
        objects: 1,
        annotations: 0,
        introspection: &[r#"<interface name="iface.iface1"/>"#],
    },
    Case {
        name: "one-interface-annotated",
        xml: r#"<node><interface name="iface.iface1"><annotation name="foo.testing" value="nothing to see here" /></interface></node>"#,
        interfaces: 1,
        objects: 0,
        annotations: 1,
        introspection: &[
            r#"<interface name="iface.iface1"><annotation name="foo.testing" value="nothing to see here" /></interface>"#,
        ],
    },
    Case {
        name: "one-interface-docnamespace",
        xml: r#"<?xml version="1.0" xmlns:doc="foo" ?><node><interface name="iface.iface1"><doc:something /></interface></node>"#,
        interfaces: 1,
        objects: 0,
        annotations: 0,
        introspection: &[r#"<interface name="iface.iface1"><doc:something /></interface>"#],
    },
];

fn check_case(case: &Case, xml: &str) {
    let object = parse_object(xml, "local.testing", "/");
    assert_eq!(object.service, "local.testing");
    assert_eq!(object.path, "/");
    assert_eq!(object.interfaces.len(), case.interfaces, "{}", case.name);
    assert_eq!(object.children.len(), case.objects, "{}", case.name);
    assert_eq!(
        parse_interface(xml).annotations.len(),
        case.annotations,
        "{}",
        case.name
    );

    let interfaces = parse_interfaces(xml);
    assert_eq!(interfaces.len(), case.interfaces, "{}", case.name);

    for (i, name) in object.interfaces.iter().enumerate() {
        assert_eq!(*name, format!("iface.iface{}", i + 1), "{}", case.name);
        assert_eq!(
            interfaces[name].introspection, case.introspection[i],
            "{}",
            case.name
        );
    }

    for (i, name) in object.children.iter().enumerate() {
        assert_eq!(*name, format!("obj{}", i + 1), "{}", case.name);
    }
}

fn with_doctype(xml: &str) -> String {
    if xml.starts_with("<?xml") {
        let split = xml.find('>').map_or(0, |n| n + 1);
        format!("{}{DOCTYPE}{}", &xml[..split], &xml[split..])
    } else {
        format!("{DOCTYPE}{xml}")
    }
}

fn in_interface(fragment: &str) -> String {
    format!(r#"<node><interface name="iface.iface1">{fragment}</interface></node>"#)
}

fn arg(ty: &str) -> Argument {
    Argument::new(ty, None)
}

fn named(ty: &str, name: &str) -> Argument {
    Argument::new(ty, Some(name))
}

fn annotations<const N: usize>(entries: [(&str, &str); N]) -> Annotations {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_owned(), Annotation::new(name, value)))
        .collect()
}

fn method(name: &str, inputs: &[Argument], outputs: &[Argument]) -> Method {
    Method {
        name: name.to_owned(),
        inputs: inputs.into(),
        outputs: outputs.into(),
        annotations: Annotations::new(),
    }
}

fn signal(name: &str, outputs: &[Argument]) -> Signal {
    Signal {
        name: name.to_owned(),
        outputs: outputs.into(),
        annotations: Annotations::new(),
    }
}

fn property(name: &str, ty: &str, access: Access) -> Property {
    Property {
        name: name.to_owned(),
        ty: ty.to_owned(),
        access,
        annotations: Annotations::new(),
    }
}

fn by_name<T>(items: impl IntoIterator<Item = T>, name: impl Fn(&T) -> &str) -> BTreeMap<String, T> {
    items
        .into_iter()
        .map(|item| (name(&item).to_owned(), item))
        .collect()
}

#[test]
fn test_simple() {
    let object = parse_object(SIMPLE, "com.example.MyService1", "/");
    assert_eq!(
        object.interfaces,
        ["com.example.MyService1.InterestingInterface"]
    );

    let interface = parse_interface(SIMPLE);
    assert_eq!(
        interface.name,
        "com.example.MyService1.InterestingInterface"
    );

    let expected = method(
        "AddContact",
        &[named("s", "name"), named("s", "email")],
        &[named("u", "id")],
    );

    assert_eq!(interface.methods["AddContact"], expected);
}

#[test]
fn test_parsing() {
    for case in CASES {
        check_case(case, case.xml);
    }
}

#[test]
fn test_parsing_with_doctype() {
    for case in CASES {
        let xml = with_doctype(case.xml);
        check_case(case, &xml);
        assert_eq!(parse_interfaces(&xml), parse_interfaces(case.xml), "{}", case.name);
        assert_eq!(
            parse_object(&xml, "a", "/"),
            parse_object(case.xml, "a", "/"),
            "{}",
            case.name
        );
    }
}

#[test]
fn test_methods() {
    let cases: Vec<(&str, Vec<Method>)> = vec![
        ("", vec![]),
        (r#"<method name="Foo"/>"#, vec![method("Foo", &[], &[])]),
        (
            r#"<method name="Foo"/><method name="Bar"/>"#,
            vec![method("Foo", &[], &[]), method("Bar", &[], &[])],
        ),
        (
            r#"<method name="Bar"/><method name="Foo"/>"#,
            vec![method("Foo", &[], &[]), method("Bar", &[], &[])],
        ),
        (
            r#"<method name="Method"><arg type="s" direction="in"/></method>"#,
            vec![method("Method", &[arg("s")], &[])],
        ),
        (
            r#"<method name="Method"><arg type="s" direction="in"/><arg type="v" direction="in"/></method>"#,
            vec![method("Method", &[arg("s"), arg("v")], &[])],
        ),
        (
            r#"<method name="Method"><arg type="s" direction="in"/><arg type="v" direction="in"/><arg type="~" name="invalid" direction="in"/></method>"#,
            vec![method(
                "Method",
                &[arg("s"), arg("v"), named("~", "invalid")],
                &[],
            )],
        ),
        (
            r#"<method name="Method"><arg type="s" direction="out"/></method>"#,
            vec![method("Method", &[], &[arg("s")])],
        ),
        (
            r#"<method name="Method"><arg type="s" direction="in"/><arg type="v" direction="in"/><arg type="s" direction="out"/></method>"#,
            vec![method("Method", &[arg("s"), arg("v")], &[arg("s")])],
        ),
        (
            r#"<method name="Method"><arg type="s" name="foo" direction="in"/><arg type="i" name="bar" direction="in"/></method>"#,
            vec![method("Method", &[named("s", "foo"), named("i", "bar")], &[])],
        ),
    ];

    for (fragment, expected) in cases {
        let interface = parse_interface(&in_interface(fragment));
        assert_eq!(interface.name, "iface.iface1");
        assert_eq!(
            interface.introspection,
            format!(r#"<interface name="iface.iface1">{fragment}</interface>"#)
        );
        assert_eq!(
            interface.methods,
            by_name(expected, |m| m.name.as_str()),
            "{fragment}"
        );
    }
}

#[test]
fn test_complex_methods() {
    let fragment = concat!(
        r#"<method name="Method1">"#,
        r#"<arg name="arg1" type="s" direction="in"/>"#,
        r#"<arg name="arg2" type="y" direction="in"/>"#,
        r#"<arg type="as" direction="out"/>"#,
        r#"</method>"#,
        r#"<method name="Method2">"#,
        r#"<arg name="variantMap" type="a{sv}" direction="in"/>"#,
        r#"<arg name="index" type="u" direction="in"/>"#,
        r#"<arg name="key" type="s" direction="out"/>"#,
        r#"<arg name="value" type="v" direction="out"/>"#,
        r#"<annotation name="foo.equivalent" value="QVariantMap"/>"#,
        r#"</method>"#,
    );

    let method1 = method(
        "Method1",
        &[named("s", "arg1"), named("y", "arg2")],
        &[arg("as")],
    );

    let mut method2 = method(
        "Method2",
        &[named("a{sv}", "variantMap"), named("u", "index")],
        &[named("s", "key"), named("v", "value")],
    );

    method2.annotations = annotations([("foo.equivalent", "QVariantMap")]);

    let interface = parse_interface(&in_interface(fragment));
    assert_eq!(
        interface.methods,
        by_name([method1, method2], |m| m.name.as_str())
    );
}

#[test]
fn test_signals() {
    let cases: Vec<(&str, Vec<Signal>)> = vec![
        ("", vec![]),
        (r#"<signal name="Foo"/>"#, vec![signal("Foo", &[])]),
        (
            r#"<signal name="Bar"/><signal name="Foo"/>"#,
            vec![signal("Foo", &[]), signal("Bar", &[])],
        ),
        (
            r#"<signal name="Signal"><arg type="s" direction="out"/></signal>"#,
            vec![signal("Signal", &[arg("s")])],
        ),
        (
            r#"<signal name="Signal"><arg type="s"/></signal>"#,
            vec![signal("Signal", &[arg("s")])],
        ),
        (
            r#"<signal name="Signal"><arg type="s" direction="out"/><arg type="i" name="bar"/></signal>"#,
            vec![signal("Signal", &[arg("s"), named("i", "bar")])],
        ),
    ];

    for (fragment, expected) in cases {
        let interface = parse_interface(&in_interface(fragment));
        assert_eq!(
            interface.signals,
            by_name(expected, |s| s.name.as_str()),
            "{fragment}"
        );
    }
}

#[test]
fn test_signal_with_annotation() {
    let fragment = r#"<signal name="Foo"/><signal name="Baz"><annotation name="foo.testing" value="nothing to see here" /></signal>"#;

    let mut baz = signal("Baz", &[]);
    baz.annotations = annotations([("foo.testing", "nothing to see here")]);

    let interface = parse_interface(&in_interface(fragment));
    assert_eq!(
        interface.signals,
        by_name([signal("Foo", &[]), baz], |s| s.name.as_str())
    );
}

#[test]
fn test_argument_direction_defaults() {
    let xml = in_interface(concat!(
        r#"<method name="M"><arg type="s"/></method>"#,
        r#"<signal name="S"><arg type="s"/></signal>"#,
    ));

    let interface = parse_interface(&xml);
    assert_eq!(*interface.methods["M"].inputs, [arg("s")]);
    assert!(interface.methods["M"].outputs.is_empty());
    assert_eq!(*interface.signals["S"].outputs, [arg("s")]);
}

#[test]
fn test_invalid_argument_directions() {
    let xml = in_interface(concat!(
        r#"<method name="M"><arg type="s" direction="sideways"/><arg type="u"/></method>"#,
        r#"<signal name="S"><arg type="s" direction="in"/><arg type="u"/></signal>"#,
        r#"<method name="N"><arg name="untyped"/></method>"#,
    ));

    let interface = parse_interface(&xml);
    assert_eq!(*interface.methods["M"].inputs, [arg("u")]);
    assert_eq!(*interface.signals["S"].outputs, [arg("u")]);
    assert!(interface.methods["N"].inputs.is_empty());
}

#[test]
fn test_properties() {
    let cases: Vec<(&str, Vec<Property>)> = vec![
        ("", vec![]),
        (
            r#"<property access="read" type="s" name="foo" />"#,
            vec![property("foo", "s", Access::Read)],
        ),
        (
            r#"<property access="write" type="s" name="foo"/>"#,
            vec![property("foo", "s", Access::Write)],
        ),
        (
            r#"<property access="readwrite" type="s" name="foo"/>"#,
            vec![property("foo", "s", Access::ReadWrite)],
        ),
        (
            r#"<property access="read" type="i" name="bar"/><property access="readwrite" type="s" name="foo"/>"#,
            vec![
                property("foo", "s", Access::ReadWrite),
                property("bar", "i", Access::Read),
            ],
        ),
    ];

    for (fragment, expected) in cases {
        let interface = parse_interface(&in_interface(fragment));
        assert_eq!(
            interface.properties,
            by_name(expected, |p| p.name.as_str()),
            "{fragment}"
        );
    }
}

#[test]
fn test_property_annotations_in_any_order() {
    let mut baz = property("baz", "as", Access::Write);
    baz.annotations = annotations([
        ("foo.annotation", "Hello, World"),
        ("foo.annotation2", "Goodbye, World"),
    ]);

    let expected = by_name(
        [
            property("bar", "i", Access::Read),
            baz,
            property("foo", "s", Access::ReadWrite),
        ],
        |p| p.name.as_str(),
    );

    let first = concat!(
        r#"<property access="read" type="i" name="bar"/>"#,
        r#"<property access="write" type="as" name="baz">"#,
        r#"<annotation name="foo.annotation" value="Hello, World" />"#,
        r#"<annotation name="foo.annotation2" value="Goodbye, World" />"#,
        r#"</property>"#,
        r#"<property access="readwrite" type="s" name="foo"/>"#,
    );

    let second = concat!(
        r#"<property access="write" type="as" name="baz">"#,
        r#"<annotation name="foo.annotation2" value="Goodbye, World" />"#,
        r#"<annotation name="foo.annotation" value="Hello, World" />"#,
        r#"</property>"#,
        r#"<property access="read" type="i" name="bar"/>"#,
        r#"<property access="readwrite" type="s" name="foo"/>"#,
    );

    assert_eq!(parse_interface(&in_interface(first)).properties, expected);
    assert_eq!(parse_interface(&in_interface(second)).properties, expected);
}

#[test]
fn test_invalid_properties_are_dropped() {
    let xml = in_interface(concat!(
        r#"<property type="s" name="noaccess"/>"#,
        r#"<property access="sometimes" type="s" name="badaccess"/>"#,
        r#"<property access="read" name="notype"/>"#,
        r#"<property access="read" type="s"/>"#,
        r#"<property access="read" type="s" name="ok"/>"#,
    ));

    let interface = parse_interface(&xml);
    assert_eq!(
        interface.properties.keys().collect::<Vec<_>>(),
        ["ok"]
    );
}

#[test]
fn test_annotation_overwrite() {
    let xml = in_interface(concat!(
        r#"<method name="M">"#,
        r#"<annotation name="a" value="first"/>"#,
        r#"<annotation name="a" value="second"/>"#,
        r#"</method>"#,
    ));

    let interface = parse_interface(&xml);
    let annotations = &interface.methods["M"].annotations;
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations["a"].value, "second");
}

#[test]
fn test_duplicate_members_overwrite() {
    let xml = in_interface(concat!(
        r#"<method name="M"><arg type="s"/></method>"#,
        r#"<method name="M"/>"#,
        r#"<signal name="S"/>"#,
        r#"<signal name="S"><arg type="u"/></signal>"#,
        r#"<property name="P" type="s" access="read"/>"#,
        r#"<property name="P" type="u" access="write"/>"#,
    ));

    let interface = parse_interface(&xml);
    assert_eq!(interface.methods["M"], method("M", &[], &[]));
    assert_eq!(interface.signals["S"], signal("S", &[arg("u")]));
    assert_eq!(interface.properties["P"], property("P", "u", Access::Write));
}

#[test]
fn test_duplicate_interfaces_overwrite() {
    let xml = concat!(
        r#"<node>"#,
        r#"<interface name="a"><method name="First"/></interface>"#,
        r#"<interface name="b"/>"#,
        r#"<interface name="a"><method name="Second"/></interface>"#,
        r#"</node>"#,
    );

    let object = parse_object(xml, "s", "/");
    assert_eq!(object.interfaces, ["a", "b"]);

    let interfaces = parse_interfaces(xml);
    assert_eq!(interfaces.len(), 2);
    assert!(interfaces["a"].methods.contains_key("Second"));
    assert!(!interfaces["a"].methods.contains_key("First"));
}

#[test]
fn test_annotation_location() {
    let xml = "<node>\n  <interface name=\"a\">\n    <annotation name=\"x\" value=\"y\"/>\n  </interface>\n</node>";

    let interface = parse_interface(xml);
    assert_eq!(
        interface.annotations["x"].location,
        SourceLocation { line: 3, column: 5 }
    );

    let with_declaration = format!("<?xml version=\"1.0\"?>\n{xml}");
    let interface = parse_interface(&with_declaration);
    assert_eq!(
        interface.annotations["x"].location,
        SourceLocation { line: 4, column: 5 }
    );
}

#[test]
fn test_annotation_without_value() {
    let interface = parse_interface(&in_interface(r#"<annotation name="flag"/>"#));
    assert_eq!(interface.annotations["flag"].value, "");
}

#[test]
fn test_escaped_attributes() {
    let interface = parse_interface(&in_interface(
        r#"<annotation name="doc" value="a &lt;b&gt; &amp; &quot;c&quot;"/>"#,
    ));

    assert_eq!(interface.annotations["doc"].value, r#"a <b> & "c""#);
}

#[test]
fn test_round_trip() {
    let interface = parse_interface(SIMPLE);
    let again = parse_interface(&format!("<node>{}</node>", interface.introspection));
    assert_eq!(again, interface);

    let fragment = concat!(
        r#"<method name="Frob"><arg name="x" type="a{sv}"/><annotation name="k" value="v"/></method>"#,
        r#"<signal name="Frobbed"><arg type="u"/></signal>"#,
        r#"<property name="Level" type="d" access="readwrite"><annotation name="p" value="q"/></property>"#,
        r#"<annotation name="iface" value="yes"/>"#,
    );

    let interface = parse_interface(&in_interface(fragment));
    let again = parse_interface(&format!("<node>\n{}\n</node>", interface.introspection));
    assert_eq!(again, interface);

    // The captured fragment parses on its own.
    let again = parse_interface(&interface.introspection);
    assert_eq!(again, interface);
    assert_eq!(again.introspection, interface.introspection);
}

#[test]
fn test_interface_root() {
    let xml = r#"<interface name="a.b"><method name="M"><arg type="s"/></method></interface>"#;

    let interfaces = parse_interfaces(xml);
    assert_eq!(interfaces.keys().collect::<Vec<_>>(), ["a.b"]);
    assert_eq!(interfaces["a.b"].methods["M"].inputs[0].ty, "s");
    assert_eq!(interfaces["a.b"].introspection, xml);

    let with_declaration = format!("<?xml version=\"1.0\"?>\n{xml}");
    assert_eq!(parse_interface(&with_declaration), parse_interface(xml));

    // Interfaces are still only recognized at the root or directly under it.
    assert!(parse_interfaces(r#"<junk><interface name="a.b"/></junk>"#).is_empty());
}

#[test]
fn test_children_are_not_descended() {
    let xml = concat!(
        r#"<node name="/org/example">"#,
        r#"<node name="a"><interface name="hidden"/><node name="b"/></node>"#,
        r#"<node/>"#,
        r#"<node name="c"></node>"#,
        r#"</node>"#,
    );

    let object = parse_object(xml, "org.example", "/org/example");
    assert_eq!(object.children, ["a", "c"]);
    assert!(object.interfaces.is_empty());
    assert!(parse_interfaces(xml).is_empty());
}

#[test]
fn test_unknown_elements_are_skipped() {
    let xml = concat!(
        r#"<node>"#,
        r#"<unknown><interface name="hidden"/></unknown>"#,
        r#"<interface name="a"><frobnicator><method name="Hidden"/></frobnicator><method name="Shown"/></interface>"#,
        r#"</node>"#,
    );

    let interfaces = parse_interfaces(xml);
    assert_eq!(interfaces.keys().collect::<Vec<_>>(), ["a"]);
    assert_eq!(
        interfaces["a"].methods.keys().collect::<Vec<_>>(),
        ["Shown"]
    );
}

#[test]
fn test_malformed_keeps_completed_elements() {
    let xml = r#"<node><interface name="a"/><interface name="b""#;

    let interfaces = parse_interfaces(xml);
    assert!(interfaces.contains_key("a"));
    assert!(!interfaces.contains_key("b"));

    assert!(parse_interfaces("<<<").is_empty());
    assert_eq!(parse_interface("not xml at all"), Default::default());
}

#[test]
fn test_parse_interface_picks_lowest_name() {
    let xml = r#"<node><interface name="z"/><interface name="m"/></node>"#;
    assert_eq!(parse_interface(xml).name, "m");
}

#[test]
fn test_concurrent_parsing() {
    thread::scope(|s| {
        let handles = (0..4)
            .map(|_| s.spawn(|| parse_interface(SIMPLE)))
            .collect::<Vec<_>>();

        for handle in handles {
            let interface = handle.join().expect("parser thread panicked");
            assert_eq!(interface.methods["AddContact"].inputs.len(), 2);
        }
    });
}
