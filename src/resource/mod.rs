//! Resource model mapping logical ABAP object references to ADT
//! resource paths and content types.
//!
//! Resolution is a pure function over a closed kind table; a kind/
//! operation combination without a server endpoint fails locally with
//! [`Error::UnsupportedObjectKind`] before any network call.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{Error, Result};

/// Characters escaped in path segments. ABAP names may contain `/`
/// (namespaces like `/ABC/CL_FOO`) which must not split the segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/');

/// Closed set of supported ABAP object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ObjectKind {
    Program,
    Include,
    Class,
    Interface,
    Package,
}

/// Per-kind table entry: collection path, ADT type code, metadata
/// content type and XML namespaces. Adding a kind is a table entry.
struct KindEntry {
    basepath: &'static str,
    type_code: &'static str,
    mimetype: &'static str,
    xml_name: &'static str,
    xmlns: &'static str,
    has_source: bool,
}

const fn entry(kind: ObjectKind) -> KindEntry {
    match kind {
        ObjectKind::Program => KindEntry {
            basepath: "programs/programs",
            type_code: "PROG/P",
            mimetype: "application/vnd.sap.adt.programs.programs.v2+xml",
            xml_name: "program:abapProgram",
            xmlns: "http://www.sap.com/adt/programs/programs",
            has_source: true,
        },
        ObjectKind::Include => KindEntry {
            basepath: "programs/includes",
            type_code: "PROG/I",
            mimetype: "application/vnd.sap.adt.programs.includes.v2+xml",
            xml_name: "include:abapInclude",
            xmlns: "http://www.sap.com/adt/programs/includes",
            has_source: true,
        },
        ObjectKind::Class => KindEntry {
            basepath: "oo/classes",
            type_code: "CLAS/OC",
            mimetype: "application/vnd.sap.adt.oo.classes.v2+xml",
            xml_name: "class:abapClass",
            xmlns: "http://www.sap.com/adt/oo/classes",
            has_source: true,
        },
        ObjectKind::Interface => KindEntry {
            basepath: "oo/interfaces",
            type_code: "INTF/OI",
            mimetype: "application/vnd.sap.adt.oo.interfaces.v2+xml",
            xml_name: "intf:abapInterface",
            xmlns: "http://www.sap.com/adt/oo/interfaces",
            has_source: true,
        },
        ObjectKind::Package => KindEntry {
            basepath: "packages",
            type_code: "DEVC/K",
            mimetype: "application/vnd.sap.adt.packages.v1+xml",
            xml_name: "pak:package",
            xmlns: "http://www.sap.com/adt/packages",
            has_source: false,
        },
    }
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::Include => "include",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Package => "package",
        }
    }

    /// ADT object type code, e.g. `CLAS/OC`.
    pub fn type_code(&self) -> &'static str {
        entry(*self).type_code
    }

    /// Root element name of the kind's metadata document.
    pub fn xml_name(&self) -> &'static str {
        entry(*self).xml_name
    }

    /// Namespace of the kind's metadata document.
    pub fn xmlns(&self) -> &'static str {
        entry(*self).xmlns
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable reference to an ABAP object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub name: String,
    /// Development package the object lives in, where relevant.
    pub package: Option<String>,
}

impl ObjectRef {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            // ADT object names are case-insensitive but stored upper.
            name: name.into().to_uppercase(),
            package: None,
        }
    }

    pub fn in_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into().to_uppercase());
        self
    }

    /// ADT URI of this object, used in object-reference payloads.
    pub fn uri(&self) -> String {
        format!(
            "/sap/bc/adt/{}/{}",
            entry(self.kind).basepath,
            encode_segment(&self.name.to_lowercase())
        )
    }
}

/// Operations the resource model can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOp {
    Metadata,
    Source,
    Create,
    Lock,
    Unlock,
}

impl ResourceOp {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Source => "source",
            Self::Create => "create",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }
}

/// Resolved resource: path relative to the ADT root plus the content
/// types the service expects for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub path: String,
    pub accept: &'static str,
    pub content_type: &'static str,
}

const SOURCE_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const LOCK_RESULT_ACCEPT: &str =
    "application/vnd.sap.as+xml;charset=UTF-8;dataname=com.sap.adt.lock.result";

/// Resolve `(object, operation)` to an ADT resource. Pure; identical
/// inputs always yield identical output.
pub fn resolve(obj: &ObjectRef, op: ResourceOp) -> Result<Resource> {
    let e = entry(obj.kind);
    let name = encode_segment(&obj.name.to_lowercase());

    let resource = match op {
        ResourceOp::Metadata => Resource {
            path: format!("{}/{}", e.basepath, name),
            accept: e.mimetype,
            content_type: e.mimetype,
        },
        ResourceOp::Create => Resource {
            path: e.basepath.to_string(),
            accept: e.mimetype,
            content_type: e.mimetype,
        },
        ResourceOp::Source => {
            if !e.has_source {
                return Err(Error::unsupported(obj.kind.as_str(), op.as_str()));
            }
            Resource {
                path: format!("{}/{}/source/main", e.basepath, name),
                accept: SOURCE_CONTENT_TYPE,
                content_type: SOURCE_CONTENT_TYPE,
            }
        }
        ResourceOp::Lock | ResourceOp::Unlock => {
            if !e.has_source {
                return Err(Error::unsupported(obj.kind.as_str(), op.as_str()));
            }
            Resource {
                path: format!("{}/{}", e.basepath, name),
                accept: LOCK_RESULT_ACCEPT,
                content_type: "application/xml",
            }
        }
    };

    Ok(resource)
}

/// Path of the mass-activation endpoint, shared by every kind.
pub const ACTIVATION_PATH: &str = "activation";

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}
