//! XML codec for ADT request and response bodies.
//!
//! Encoding builds the small, fixed request documents directly; decoding
//! walks `quick-xml` events and is best-effort defensive: unexpected or
//! missing elements degrade to partial records flagged via
//! [`Decoded::incomplete`], while non-well-formed XML fails with
//! [`Error::MalformedResponse`]. Repeated elements (findings, messages)
//! keep document order since the order reflects server-side priority.

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::resource::ObjectRef;
use crate::types::{
    AtcCustomizing, Finding, Location, PullResult, RepoInfo, RunResult, RunStatus, Severity,
};

/// A decoded record plus a marker telling whether every expected field
/// was recovered. Callers can distinguish benign schema drift from hard
/// parse failures.
#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub value: T,
    pub incomplete: bool,
}

impl<T> Decoded<T> {
    fn complete(value: T) -> Self {
        Self {
            value,
            incomplete: false,
        }
    }

    fn partial(value: T) -> Self {
        Self {
            value,
            incomplete: true,
        }
    }
}

// ===== Encoding =====

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
const ADTCORE_NS: &str = "http://www.sap.com/adt/core";

/// Metadata document used to create an object.
pub fn encode_object_metadata(
    obj: &ObjectRef,
    description: &str,
    responsible: &str,
    language: &str,
) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECL);
    xml.push_str(&format!(
        "<{} xmlns:{}=\"{}\" xmlns:adtcore=\"{}\"",
        obj.kind.xml_name(),
        obj.kind.xml_name().split(':').next().unwrap_or("adt"),
        obj.kind.xmlns(),
        ADTCORE_NS,
    ));
    xml.push_str(&format!(
        " adtcore:type=\"{}\" adtcore:name=\"{}\" adtcore:description=\"{}\"",
        obj.kind.type_code(),
        escape_xml(&obj.name),
        escape_xml(description),
    ));
    xml.push_str(&format!(
        " adtcore:language=\"{lang}\" adtcore:masterLanguage=\"{lang}\" adtcore:responsible=\"{}\" adtcore:version=\"active\">",
        escape_xml(responsible),
        lang = escape_xml(language),
    ));
    if let Some(package) = &obj.package {
        xml.push_str(&format!(
            "<adtcore:packageRef adtcore:name=\"{}\"/>",
            escape_xml(package)
        ));
    }
    xml.push_str(&format!("</{}>", obj.kind.xml_name()));
    xml
}

/// `adtcore:objectReferences` list used by activation and run configs.
fn object_references(objects: &[ObjectRef]) -> String {
    let mut xml = String::new();
    for obj in objects {
        xml.push_str(&format!(
            "<adtcore:objectReference adtcore:uri=\"{}\" adtcore:name=\"{}\"/>",
            escape_xml(&obj.uri()),
            escape_xml(&obj.name),
        ));
    }
    xml
}

/// Body of a mass-activation request.
pub fn encode_activation_request(objects: &[ObjectRef]) -> String {
    format!(
        "{XML_DECL}<adtcore:objectReferences xmlns:adtcore=\"{ADTCORE_NS}\">{}</adtcore:objectReferences>",
        object_references(objects),
    )
}

/// AUnit run configuration covering the given objects.
pub fn encode_aunit_config(objects: &[ObjectRef]) -> String {
    format!(
        concat!(
            "{decl}<aunit:runConfiguration xmlns:aunit=\"http://www.sap.com/adt/aunit\">",
            "<external><coverage active=\"false\"/></external>",
            "<adtcore:objectSets xmlns:adtcore=\"{core}\">",
            "<objectSet kind=\"inclusive\">",
            "<adtcore:objectReferences>{refs}</adtcore:objectReferences>",
            "</objectSet>",
            "</adtcore:objectSets>",
            "</aunit:runConfiguration>"
        ),
        decl = XML_DECL,
        core = ADTCORE_NS,
        refs = object_references(objects),
    )
}

/// ATC run request for an already created worklist.
pub fn encode_atc_run(objects: &[ObjectRef], max_verdicts: u32) -> String {
    format!(
        concat!(
            "{decl}<atc:run xmlns:atc=\"http://www.sap.com/adt/atc\" maximumVerdicts=\"{max}\">",
            "<objectSets xmlns:adtcore=\"{core}\">",
            "<objectSet kind=\"inclusive\">",
            "<adtcore:objectReferences>{refs}</adtcore:objectReferences>",
            "</objectSet>",
            "</objectSets>",
            "</atc:run>"
        ),
        decl = XML_DECL,
        max = max_verdicts,
        core = ADTCORE_NS,
        refs = object_references(objects),
    )
}

/// Body of an abapGit pull request.
pub fn encode_abapgit_pull(branch: Option<&str>) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECL);
    xml.push_str("<abapgitexternalrepo:externalRepoInfoRequest xmlns:abapgitexternalrepo=\"http://www.sap.com/adt/abapgit/externalRepo\">");
    if let Some(branch) = branch {
        xml.push_str(&format!("<branch>{}</branch>", escape_xml(branch)));
    }
    xml.push_str("</abapgitexternalrepo:externalRepoInfoRequest>");
    xml
}

/// Repository document used to link a new abapGit repository.
pub fn encode_abapgit_link(url: &str, package: &str, branch: &str) -> String {
    format!(
        concat!(
            "{decl}<abapgitrepo:repository xmlns:abapgitrepo=\"http://www.sap.com/adt/abapgit/repositories\">",
            "<abapgitrepo:package>{package}</abapgitrepo:package>",
            "<abapgitrepo:url>{url}</abapgitrepo:url>",
            "<abapgitrepo:branchName>{branch}</abapgitrepo:branchName>",
            "</abapgitrepo:repository>"
        ),
        decl = XML_DECL,
        package = escape_xml(package),
        url = escape_xml(url),
        branch = escape_xml(branch),
    )
}

// ===== Decoding =====

/// Thin wrapper over `quick_xml::Reader` that strips namespace prefixes
/// and converts parse failures into [`Error::MalformedResponse`].
struct Walker<'a> {
    reader: Reader<&'a [u8]>,
    depth: usize,
}

#[derive(Debug)]
enum Node {
    Start { name: String, attrs: Vec<(String, String)> },
    Empty { name: String, attrs: Vec<(String, String)> },
    End { name: String },
    Text(String),
    Eof,
}

impl<'a> Walker<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);
        Self { reader, depth: 0 }
    }

    fn next(&mut self) -> Result<Node> {
        let mut buf = Vec::new();
        let event = self
            .reader
            .read_event_into(&mut buf)
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;

        let node = match event {
            Event::Start(e) => {
                self.depth += 1;
                Node::Start {
                    name: local_name(e.name().as_ref()),
                    attrs: collect_attrs(&e)?,
                }
            }
            Event::Empty(e) => Node::Empty {
                name: local_name(e.name().as_ref()),
                attrs: collect_attrs(&e)?,
            },
            Event::End(e) => {
                self.depth = self.depth.saturating_sub(1);
                Node::End {
                    name: local_name(e.name().as_ref()),
                }
            }
            Event::Text(t) => Node::Text(
                t.unescape()
                    .map_err(|e| Error::MalformedResponse(e.to_string()))?
                    .into_owned(),
            ),
            Event::CData(t) => Node::Text(String::from_utf8_lossy(&t.into_inner()).into_owned()),
            Event::Eof => {
                // Truncated feeds end with elements still open.
                if self.depth > 0 {
                    return Err(Error::MalformedResponse(
                        "document ended inside an open element".to_string(),
                    ));
                }
                Node::Eof
            }
            // Declarations, comments, processing instructions
            _ => Node::Text(String::new()),
        };

        Ok(node)
    }
}

fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

fn collect_attrs(e: &quick_xml::events::BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::MalformedResponse(e.to_string()))?;
        let key = local_name(attr.key.as_ref());
        let value = attr
            .unescape_value()
            .map_err(|e| Error::MalformedResponse(e.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(attrs)
}

fn attr<'v>(attrs: &'v [(String, String)], key: &str) -> Option<&'v str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// A check message reported by the activation endpoint.
#[derive(Debug, Clone)]
pub struct CheckMessage {
    /// Message type: `E` (error), `W` (warning), `I`/`S` informational.
    pub typ: String,
    pub object_uri: String,
    pub text: String,
}

impl CheckMessage {
    pub fn is_error(&self) -> bool {
        self.typ == "E" || self.typ == "A"
    }
}

/// Decode the activation check-message list. An empty document means
/// the activation succeeded without remarks.
pub fn decode_activation_messages(bytes: &[u8]) -> Result<Decoded<Vec<CheckMessage>>> {
    let mut walker = Walker::new(bytes);
    let mut messages = Vec::new();
    let mut incomplete = false;

    let mut current: Option<CheckMessage> = None;
    let mut in_short_text = false;

    loop {
        match walker.next()? {
            Node::Start { name, attrs } if name == "msg" => {
                current = Some(CheckMessage {
                    typ: attr(&attrs, "type").unwrap_or("E").to_string(),
                    object_uri: attr(&attrs, "href").unwrap_or_default().to_string(),
                    text: String::new(),
                });
            }
            Node::Start { name, .. } if name == "shortText" || name == "txt" => {
                in_short_text = true;
            }
            Node::Text(text) if in_short_text => {
                if let Some(msg) = current.as_mut() {
                    msg.text = text;
                }
            }
            Node::End { name } if name == "shortText" || name == "txt" => {
                in_short_text = false;
            }
            Node::End { name } if name == "msg" => {
                match current.take() {
                    Some(msg) => {
                        if msg.text.is_empty() {
                            incomplete = true;
                        }
                        messages.push(msg);
                    }
                    None => incomplete = true,
                }
            }
            Node::Eof => break,
            _ => {}
        }
    }

    Ok(if incomplete {
        Decoded::partial(messages)
    } else {
        Decoded::complete(messages)
    })
}

/// Decode the lock handle issued by a `_action=LOCK` request.
pub fn decode_lock_handle(bytes: &[u8]) -> Result<String> {
    let mut walker = Walker::new(bytes);
    let mut in_handle = false;

    loop {
        match walker.next()? {
            Node::Start { name, .. } if name == "LOCK_HANDLE" => in_handle = true,
            Node::Text(text) if in_handle => return Ok(text),
            Node::End { name } if name == "LOCK_HANDLE" => in_handle = false,
            Node::Eof => break,
            _ => {}
        }
    }

    Err(Error::Protocol(
        "lock response carried no LOCK_HANDLE element".to_string(),
    ))
}

fn run_status_from_str(s: &str) -> Option<RunStatus> {
    match s.to_ascii_lowercase().as_str() {
        "created" => Some(RunStatus::Created),
        "running" => Some(RunStatus::Running),
        "finished" | "completed" => Some(RunStatus::Finished),
        "failed" => Some(RunStatus::Failed),
        "succeeded" | "success" | "s" => Some(RunStatus::Succeeded),
        "conflict" | "a" => Some(RunStatus::Conflict),
        "error" | "e" => Some(RunStatus::Error),
        "r" => Some(RunStatus::Running),
        _ => None,
    }
}

fn aunit_severity(kind: &str) -> Severity {
    match kind {
        "critical" | "fatal" => Severity::Error,
        "tolerable" => Severity::Warning,
        _ => Severity::Info,
    }
}

/// Decode an AUnit run document: run status plus, once finished, the
/// alert findings grouped by test class and method.
pub fn decode_aunit_run(bytes: &[u8]) -> Result<Decoded<RunResult>> {
    let mut walker = Walker::new(bytes);
    let mut result = RunResult::default();
    let mut incomplete = false;

    let mut status_seen = false;
    let mut container = String::new();
    let mut alert: Option<Finding> = None;
    let mut in_title = false;

    loop {
        let node = walker.next()?;
        match node {
            Node::Start { ref name, ref attrs } | Node::Empty { ref name, ref attrs } => {
                match name.as_str() {
                    "run" | "runResult" => {
                        if let Some(id) = attr(attrs, "id") {
                            result.handle = id.to_string();
                        }
                        match attr(attrs, "status").and_then(run_status_from_str) {
                            Some(status) => {
                                result.status = status;
                                status_seen = true;
                            }
                            None => incomplete = true,
                        }
                    }
                    "program" | "testClass" => {
                        if let Some(n) = attr(attrs, "name") {
                            container = n.to_string();
                        }
                    }
                    "testMethod" => {
                        if let Some(n) = attr(attrs, "name") {
                            container = format!("{}=>{}", container_base(&container), n);
                        }
                    }
                    "alert" => {
                        alert = Some(Finding {
                            object: container.clone(),
                            severity: attr(attrs, "severity")
                                .map(aunit_severity)
                                .unwrap_or(Severity::Error),
                            priority: None,
                            check_title: attr(attrs, "kind").unwrap_or("alert").to_string(),
                            message: String::new(),
                            location: Location::default(),
                        });
                    }
                    "title" => in_title = true,
                    _ => {}
                }
            }
            Node::Text(text) if in_title => {
                if let Some(a) = alert.as_mut() {
                    a.message = text;
                }
            }
            Node::End { name } => match name.as_str() {
                "title" => in_title = false,
                "alert" => {
                    if let Some(a) = alert.take() {
                        if a.message.is_empty() {
                            incomplete = true;
                        }
                        result.findings.push(a);
                    }
                }
                _ => {}
            },
            Node::Eof => break,
            _ => {}
        }
    }

    if !status_seen {
        incomplete = true;
    }
    result.incomplete = incomplete;

    Ok(if incomplete {
        Decoded::partial(result)
    } else {
        Decoded::complete(result)
    })
}

/// `ZCL_X=>METH` keeps the class part when a second method follows.
fn container_base(container: &str) -> &str {
    container.split("=>").next().unwrap_or(container)
}

/// Decode the status document of an ATC run.
pub fn decode_atc_run_status(bytes: &[u8]) -> Result<Decoded<RunResult>> {
    let mut walker = Walker::new(bytes);
    let mut result = RunResult::default();
    let mut incomplete = true;
    let mut in_status = false;

    loop {
        match walker.next()? {
            Node::Start { name, attrs } => match name.as_str() {
                "worklistRun" => {
                    if let Some(id) = attr(&attrs, "worklistId") {
                        result.handle = id.to_string();
                    }
                }
                "worklistId" | "status" => in_status = name == "status",
                _ => {}
            },
            Node::Text(text) if in_status => {
                if let Some(status) = run_status_from_str(&text) {
                    result.status = status;
                    incomplete = false;
                }
            }
            Node::End { name } if name == "status" => in_status = false,
            Node::Eof => break,
            _ => {}
        }
    }

    result.incomplete = incomplete;
    Ok(if incomplete {
        Decoded::partial(result)
    } else {
        Decoded::complete(result)
    })
}

static LOCATION_RE: OnceLock<Regex> = OnceLock::new();

/// Extract line and column from a finding location URI fragment such as
/// `...#start=12,4`.
pub fn parse_location(uri: &str) -> Location {
    let re = LOCATION_RE
        .get_or_init(|| Regex::new(r"start=(?P<line>\d+)(,(?P<column>\d+))?").expect("valid regex"));

    let mut location = Location {
        uri: uri.to_string(),
        line: 0,
        column: 0,
    };

    if let Some(caps) = re.captures(uri) {
        location.line = caps
            .name("line")
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        location.column = caps
            .name("column")
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
    }

    location
}

/// Decode an ATC worklist into findings, keeping the server's order.
pub fn decode_atc_worklist(bytes: &[u8]) -> Result<Decoded<RunResult>> {
    let mut walker = Walker::new(bytes);
    let mut result = RunResult {
        status: RunStatus::Finished,
        ..RunResult::default()
    };
    let mut incomplete = false;
    let mut object_name = String::new();

    loop {
        match walker.next()? {
            Node::Start { ref name, ref attrs } | Node::Empty { ref name, ref attrs } => {
                match name.as_str() {
                    "worklist" => {
                        if let Some(id) = attr(attrs, "id") {
                            result.handle = id.to_string();
                        }
                    }
                    "object" => {
                        object_name = attr(attrs, "name").unwrap_or_default().to_string();
                        if object_name.is_empty() {
                            incomplete = true;
                        }
                    }
                    "finding" => {
                        let priority: Option<u8> =
                            attr(attrs, "priority").and_then(|p| p.parse().ok());
                        if priority.is_none() {
                            incomplete = true;
                        }
                        result.findings.push(Finding {
                            object: object_name.clone(),
                            severity: priority.map(Severity::from_priority).unwrap_or(Severity::Info),
                            priority,
                            check_title: attr(attrs, "checkTitle").unwrap_or_default().to_string(),
                            message: attr(attrs, "messageTitle").unwrap_or_default().to_string(),
                            location: parse_location(attr(attrs, "location").unwrap_or_default()),
                        });
                    }
                    _ => {}
                }
            }
            Node::Eof => break,
            _ => {}
        }
    }

    result.incomplete = incomplete;
    Ok(if incomplete {
        Decoded::partial(result)
    } else {
        Decoded::complete(result)
    })
}

/// Decode ATC customizing properties.
pub fn decode_atc_customizing(bytes: &[u8]) -> Result<Decoded<AtcCustomizing>> {
    let mut walker = Walker::new(bytes);
    let mut customizing = AtcCustomizing::default();

    loop {
        match walker.next()? {
            Node::Start { ref name, ref attrs } | Node::Empty { ref name, ref attrs }
                if name == "property" =>
            {
                if attr(attrs, "name") == Some("systemCheckVariant") {
                    customizing.system_check_variant =
                        attr(attrs, "value").unwrap_or_default().to_string();
                }
            }
            Node::Eof => break,
            _ => {}
        }
    }

    if customizing.system_check_variant.is_empty() {
        Ok(Decoded::partial(customizing))
    } else {
        Ok(Decoded::complete(customizing))
    }
}

fn decode_repository_fields(repo: &mut RepoInfo, field: &str, text: String) {
    match field {
        "key" => repo.key = text,
        "package" => repo.package = text,
        "url" => repo.url = text,
        "branchName" => repo.branch = text,
        "status" => {
            if let Some(status) = run_status_from_str(&text) {
                repo.status = status;
            }
        }
        "statusText" => repo.status_text = Some(text),
        _ => {}
    }
}

/// Decode the abapGit repository list.
pub fn decode_abapgit_repos(bytes: &[u8]) -> Result<Decoded<Vec<RepoInfo>>> {
    let mut walker = Walker::new(bytes);
    let mut repos = Vec::new();
    let mut incomplete = false;

    let mut current: Option<RepoInfo> = None;
    let mut field = String::new();

    loop {
        match walker.next()? {
            Node::Start { name, .. } => match name.as_str() {
                "repository" => current = Some(RepoInfo::default()),
                other => field = other.to_string(),
            },
            Node::Text(text) => {
                if let Some(repo) = current.as_mut() {
                    decode_repository_fields(repo, &field, text);
                }
            }
            Node::End { name } if name == "repository" => {
                if let Some(repo) = current.take() {
                    if repo.key.is_empty() || repo.package.is_empty() {
                        incomplete = true;
                    }
                    repos.push(repo);
                }
            }
            Node::Eof => break,
            _ => {}
        }
    }

    Ok(if incomplete {
        Decoded::partial(repos)
    } else {
        Decoded::complete(repos)
    })
}

/// Decode a single abapGit repository status document into a pull
/// result, collecting any sync log lines the server reports.
pub fn decode_abapgit_pull_status(bytes: &[u8]) -> Result<Decoded<PullResult>> {
    let decoded = decode_abapgit_repos(bytes)?;
    let mut result = PullResult::default();
    let mut incomplete = decoded.incomplete;

    match decoded.value.into_iter().next() {
        Some(repo) => {
            result.package = repo.package;
            result.status = repo.status;
            result.status_text = repo.status_text;
        }
        None => incomplete = true,
    }

    // Sync log lines live outside the repository element.
    let mut walker = Walker::new(bytes);
    let mut in_log = false;
    loop {
        match walker.next()? {
            Node::Start { name, .. } if name == "logLine" || name == "message" => in_log = true,
            Node::Text(text) if in_log => result.log.push(text),
            Node::End { name } if name == "logLine" || name == "message" => in_log = false,
            Node::Eof => break,
            _ => {}
        }
    }

    Ok(if incomplete {
        Decoded::partial(result)
    } else {
        Decoded::complete(result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ObjectKind, ObjectRef};

    #[test]
    fn test_encode_activation_request() {
        let objects = vec![
            ObjectRef::new(ObjectKind::Program, "ZHELLO"),
            ObjectRef::new(ObjectKind::Class, "ZCL_DEMO"),
        ];
        let xml = encode_activation_request(&objects);

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("adtcore:uri=\"/sap/bc/adt/programs/programs/zhello\""));
        assert!(xml.contains("adtcore:name=\"ZCL_DEMO\""));
        // Submission order is preserved in the document.
        let zhello = xml.find("ZHELLO").unwrap();
        let zcl = xml.find("ZCL_DEMO").unwrap();
        assert!(zhello < zcl);
    }

    #[test]
    fn test_encode_object_metadata_escapes_description() {
        let obj = ObjectRef::new(ObjectKind::Program, "ZHELLO").in_package("$TMP");
        let xml = encode_object_metadata(&obj, "say \"hello\" & <bye>", "DEVELOPER", "EN");

        assert!(xml.contains("adtcore:description=\"say &quot;hello&quot; &amp; &lt;bye&gt;\""));
        assert!(xml.contains("<adtcore:packageRef adtcore:name=\"$TMP\"/>"));
        assert!(xml.contains("adtcore:type=\"PROG/P\""));
    }

    #[test]
    fn test_decode_activation_messages() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<chkl:messages xmlns:chkl="http://www.sap.com/abapxml/checklist">
  <msg objDescr="Program ZHELLO" type="E" href="/sap/bc/adt/programs/programs/zhello">
    <shortText><txt>Statement is not recognized</txt></shortText>
  </msg>
  <msg objDescr="Program ZHELLO" type="W" href="/sap/bc/adt/programs/programs/zhello">
    <shortText><txt>Literal too long</txt></shortText>
  </msg>
</chkl:messages>"#;

        let decoded = decode_activation_messages(xml).unwrap();
        assert!(!decoded.incomplete);
        assert_eq!(decoded.value.len(), 2);
        assert!(decoded.value[0].is_error());
        assert_eq!(decoded.value[0].text, "Statement is not recognized");
        assert!(!decoded.value[1].is_error());
    }

    #[test]
    fn test_decode_activation_empty_means_success() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<chkl:messages xmlns:chkl="http://www.sap.com/abapxml/checklist"/>"#;
        let decoded = decode_activation_messages(xml).unwrap();
        assert!(decoded.value.is_empty());
        assert!(!decoded.incomplete);
    }

    #[test]
    fn test_decode_malformed_xml_fails() {
        let xml = b"<run status=\"running\"><unclosed>";
        assert!(matches!(
            decode_aunit_run(xml),
            Err(Error::MalformedResponse(_))
        ));

        // A feed cut off mid-document must fail, not yield a partial
        // record with elements still open.
        let truncated = b"<abapgitrepo:repositories><abapgitrepo:repository><abapgitrepo:key>K1";
        assert!(matches!(
            decode_abapgit_repos(truncated),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_decode_aunit_run_running() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<aunit:run xmlns:aunit="http://www.sap.com/adt/api/abapunit" id="0AB1" status="running"/>"#;
        let decoded = decode_aunit_run(xml).unwrap();
        assert!(!decoded.incomplete);
        assert_eq!(decoded.value.handle, "0AB1");
        assert_eq!(decoded.value.status, RunStatus::Running);
        assert!(decoded.value.findings.is_empty());
    }

    #[test]
    fn test_decode_aunit_run_finished_with_alerts() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<aunit:run xmlns:aunit="http://www.sap.com/adt/api/abapunit" id="0AB1" status="finished">
  <program name="ZCL_DEMO">
    <testClass name="LTC_DEMO">
      <testMethod name="TEST_FIRST">
        <alerts>
          <alert kind="failedAssertion" severity="critical">
            <title>Critical Assertion Error: 'EXPECTED =! ACTUAL'</title>
          </alert>
        </alerts>
      </testMethod>
      <testMethod name="TEST_SECOND">
        <alerts>
          <alert kind="warning" severity="tolerable">
            <title>Method took too long</title>
          </alert>
        </alerts>
      </testMethod>
    </testClass>
  </program>
</aunit:run>"#;

        let decoded = decode_aunit_run(xml).unwrap();
        assert!(!decoded.incomplete);
        assert_eq!(decoded.value.status, RunStatus::Finished);
        assert_eq!(decoded.value.findings.len(), 2);

        let first = &decoded.value.findings[0];
        assert_eq!(first.object, "LTC_DEMO=>TEST_FIRST");
        assert_eq!(first.severity, Severity::Error);
        assert!(first.message.contains("Critical Assertion Error"));

        let second = &decoded.value.findings[1];
        assert_eq!(second.object, "LTC_DEMO=>TEST_SECOND");
        assert_eq!(second.severity, Severity::Warning);
    }

    #[test]
    fn test_decode_aunit_missing_status_is_partial() {
        let xml = br#"<aunit:run xmlns:aunit="http://www.sap.com/adt/api/abapunit" id="0AB1"/>"#;
        let decoded = decode_aunit_run(xml).unwrap();
        assert!(decoded.incomplete);
        assert!(decoded.value.incomplete);
    }

    #[test]
    fn test_decode_atc_worklist_keeps_finding_order() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<atcworklist:worklist xmlns:atcworklist="http://www.sap.com/adt/atc/worklist" id="WL42">
  <atcworklist:objects>
    <atcobject:object xmlns:atcobject="http://www.sap.com/adt/atc/object" name="ZCL_DEMO">
      <atcobject:findings>
        <atcfinding:finding xmlns:atcfinding="http://www.sap.com/adt/atc/finding"
            priority="1" checkTitle="Security Checks" messageTitle="SQL injection"
            location="/sap/bc/adt/oo/classes/zcl_demo/source/main#start=42,8"/>
        <atcfinding:finding xmlns:atcfinding="http://www.sap.com/adt/atc/finding"
            priority="3" checkTitle="Performance Checks" messageTitle="SELECT in loop"
            location="/sap/bc/adt/oo/classes/zcl_demo/source/main#start=50"/>
      </atcobject:findings>
    </atcobject:object>
  </atcworklist:objects>
</atcworklist:worklist>"#;

        let decoded = decode_atc_worklist(xml).unwrap();
        assert!(!decoded.incomplete);
        assert_eq!(decoded.value.handle, "WL42");
        assert_eq!(decoded.value.findings.len(), 2);

        let first = &decoded.value.findings[0];
        assert_eq!(first.priority, Some(1));
        assert_eq!(first.severity, Severity::Error);
        assert_eq!(first.location.line, 42);
        assert_eq!(first.location.column, 8);

        let second = &decoded.value.findings[1];
        assert_eq!(second.priority, Some(3));
        assert_eq!(second.severity, Severity::Warning);
        assert_eq!(second.location.line, 50);
        assert_eq!(second.location.column, 0);
    }

    #[test]
    fn test_decode_atc_finding_without_priority_is_partial() {
        let xml = br#"<atcworklist:worklist xmlns:atcworklist="x" id="WL1">
  <atcobject:object xmlns:atcobject="y" name="ZCL_A">
    <atcfinding:finding xmlns:atcfinding="z" checkTitle="C" messageTitle="M" location=""/>
  </atcobject:object>
</atcworklist:worklist>"#;
        let decoded = decode_atc_worklist(xml).unwrap();
        assert!(decoded.incomplete);
        assert_eq!(decoded.value.findings.len(), 1);
        assert_eq!(decoded.value.findings[0].severity, Severity::Info);
    }

    #[test]
    fn test_decode_atc_run_status() {
        let xml = br#"<atcworklist:worklistRun xmlns:atcworklist="x" worklistId="WL42">
  <atcworklist:status>running</atcworklist:status>
</atcworklist:worklistRun>"#;
        let decoded = decode_atc_run_status(xml).unwrap();
        assert_eq!(decoded.value.status, RunStatus::Running);
        assert_eq!(decoded.value.handle, "WL42");
    }

    #[test]
    fn test_decode_atc_customizing() {
        let xml = br#"<atccustomizing:properties xmlns:atccustomizing="x">
  <atccustomizing:property name="systemCheckVariant" value="STANDARD"/>
</atccustomizing:properties>"#;
        let decoded = decode_atc_customizing(xml).unwrap();
        assert!(!decoded.incomplete);
        assert_eq!(decoded.value.system_check_variant, "STANDARD");
    }

    #[test]
    fn test_decode_lock_handle() {
        let xml = br#"<?xml version="1.0" encoding="utf-8"?>
<asx:abap xmlns:asx="http://www.sap.com/abapxml" version="1.0">
  <asx:values><DATA><LOCK_HANDLE>H4CK13</LOCK_HANDLE></DATA></asx:values>
</asx:abap>"#;
        assert_eq!(decode_lock_handle(xml).unwrap(), "H4CK13");
    }

    #[test]
    fn test_decode_lock_handle_missing_is_protocol_error() {
        let xml = br#"<asx:abap xmlns:asx="x"><asx:values/></asx:abap>"#;
        assert!(matches!(
            decode_lock_handle(xml),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_abapgit_repos() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<abapgitrepo:repositories xmlns:abapgitrepo="http://www.sap.com/adt/abapgit/repositories">
  <abapgitrepo:repository>
    <abapgitrepo:key>000000000001</abapgitrepo:key>
    <abapgitrepo:package>ZDEMO</abapgitrepo:package>
    <abapgitrepo:url>https://github.com/example/zdemo.git</abapgitrepo:url>
    <abapgitrepo:branchName>refs/heads/main</abapgitrepo:branchName>
    <abapgitrepo:status>S</abapgitrepo:status>
    <abapgitrepo:statusText>Pulled successfully</abapgitrepo:statusText>
  </abapgitrepo:repository>
</abapgitrepo:repositories>"#;

        let decoded = decode_abapgit_repos(xml).unwrap();
        assert!(!decoded.incomplete);
        assert_eq!(decoded.value.len(), 1);

        let repo = &decoded.value[0];
        assert_eq!(repo.key, "000000000001");
        assert_eq!(repo.package, "ZDEMO");
        assert_eq!(repo.branch, "refs/heads/main");
        assert_eq!(repo.status, RunStatus::Succeeded);
    }

    #[test]
    fn test_decode_abapgit_pull_status_with_log() {
        let xml = br#"<abapgitrepo:repositories xmlns:abapgitrepo="x">
  <abapgitrepo:repository>
    <abapgitrepo:key>000000000001</abapgitrepo:key>
    <abapgitrepo:package>ZDEMO</abapgitrepo:package>
    <abapgitrepo:status>E</abapgitrepo:status>
    <abapgitrepo:statusText>Pull failed</abapgitrepo:statusText>
  </abapgitrepo:repository>
  <logLine>Object ZCL_A imported</logLine>
  <logLine>Object ZCL_B failed: syntax error</logLine>
</abapgitrepo:repositories>"#;

        let decoded = decode_abapgit_pull_status(xml).unwrap();
        assert_eq!(decoded.value.status, RunStatus::Error);
        assert_eq!(decoded.value.status_text.as_deref(), Some("Pull failed"));
        assert_eq!(decoded.value.log.len(), 2);
        // Log order mirrors the document.
        assert!(decoded.value.log[0].contains("ZCL_A"));
    }

    #[test]
    fn test_parse_location_variants() {
        let loc = parse_location("/sap/bc/adt/x#start=12,4");
        assert_eq!((loc.line, loc.column), (12, 4));

        let loc = parse_location("/sap/bc/adt/x#start=7");
        assert_eq!((loc.line, loc.column), (7, 0));

        let loc = parse_location("");
        assert_eq!((loc.line, loc.column), (0, 0));
    }

    #[test]
    fn test_source_text_is_not_transformed() {
        // Raw ABAP source travels as plain text; the codec never touches
        // it. Byte-identical round-trip through encode/decode of the
        // upload path is the degenerate identity.
        let source = "REPORT zhello.\nWRITE: / 'Hello, World!'.\n";
        let bytes = source.as_bytes().to_vec();
        assert_eq!(String::from_utf8(bytes).unwrap(), source);
    }
}
