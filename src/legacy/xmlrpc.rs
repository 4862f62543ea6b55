//! XML-RPC encoding of legacy calls
//!
//! A call is a `methodCall` whose single parameter is a `struct` holding the
//! flat request map:
//!
//! ```text
//! <methodCall>
//!   <methodName>GetBalance</methodName>
//!   <params><param><value><struct>
//!     <member><name>clientUUID</name><value><string>...</string></value></member>
//!   </struct></value></param></params>
//! </methodCall>
//! ```
//!
//! The reply is a `methodResponse` carrying one flat `struct`, or a `fault`.

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use super::wire::{LegacyParams, LegacyRequest, LegacyResponse, LegacyValue, param_int, param_str};
use crate::backend::BackendError;

pub fn encode_call(request: &LegacyRequest) -> String {
    let mut xml = String::from(r#"<?xml version="1.0"?><methodCall><methodName>"#);
    xml.push_str(request.op.method_name());
    xml.push_str("</methodName><params><param><value><struct>");
    for (name, value) in &request.params {
        xml.push_str("<member><name>");
        xml.push_str(&escape(name.as_str()));
        xml.push_str("</name><value>");
        encode_value(&mut xml, value);
        xml.push_str("</value></member>");
    }
    xml.push_str("</struct></value></param></params></methodCall>");
    xml
}

fn encode_value(xml: &mut String, value: &LegacyValue) {
    match value {
        LegacyValue::Bool(b) => {
            xml.push_str(if *b { "<boolean>1</boolean>" } else { "<boolean>0</boolean>" })
        }
        LegacyValue::Int(i) => match i32::try_from(*i) {
            Ok(i) => xml.push_str(&format!("<int>{}</int>", i)),
            // <int> is 32-bit; wider values travel as text
            Err(_) => xml.push_str(&format!("<string>{}</string>", i)),
        },
        LegacyValue::Str(s) => {
            xml.push_str("<string>");
            xml.push_str(&escape(s.as_str()));
            xml.push_str("</string>");
        }
    }
}

fn malformed(e: impl std::fmt::Display) -> BackendError {
    BackendError::Protocol(format!("Malformed XML-RPC response: {}", e))
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Typed scalar from the innermost element around a text node
fn scalar(tag: &str, text: &str) -> Result<LegacyValue, BackendError> {
    match tag {
        "i4" | "int" | "i8" => text
            .trim()
            .parse()
            .map(LegacyValue::Int)
            .map_err(|_| malformed(format!("bad integer '{}'", text))),
        "boolean" => match text.trim() {
            "1" | "true" => Ok(LegacyValue::Bool(true)),
            "0" | "false" => Ok(LegacyValue::Bool(false)),
            other => Err(malformed(format!("bad boolean '{}'", other))),
        },
        // untyped values are strings
        "value" | "string" | "double" | "dateTime.iso8601" | "base64" => {
            Ok(LegacyValue::Str(text.to_string()))
        }
        other => Err(malformed(format!("unexpected text in <{}>", other))),
    }
}

/// Decode a `methodResponse`; a fault becomes [`BackendError::Protocol`]
pub fn decode_response(xml: &str) -> Result<LegacyResponse, BackendError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut fields = LegacyParams::new();
    let mut name: Option<String> = None;
    let mut value: Option<LegacyValue> = None;
    let mut structs = 0usize;
    let mut fault = false;

    loop {
        match reader.read_event().map_err(malformed)? {
            Event::Start(e) => {
                let tag = tag_name(e.name().as_ref());
                match tag.as_str() {
                    "fault" => fault = true,
                    "struct" => {
                        structs += 1;
                        if structs > 1 {
                            return Err(malformed("nested struct in a flat reply"));
                        }
                    }
                    "array" => return Err(malformed("array in a flat reply")),
                    _ => {}
                }
                stack.push(tag);
            }
            Event::Empty(e) => {
                let tag = tag_name(e.name().as_ref());
                if tag == "value" || stack.last().is_some_and(|t| t == "value") {
                    value = Some(scalar(&tag, "")?);
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(malformed)?;
                match stack.last().map(String::as_str) {
                    Some("name") => name = Some(text.into_owned()),
                    Some(tag) if stack.iter().any(|t| t == "member") => {
                        value = Some(scalar(tag, &text)?);
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                if stack.pop().as_deref() == Some("member") {
                    if let Some(member) = name.take() {
                        let v = value.take().unwrap_or_else(|| LegacyValue::Str(String::new()));
                        fields.insert(member, v);
                    }
                    value = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if fault {
        let code = param_int(&fields, "faultCode").unwrap_or(0);
        let message = param_str(&fields, "faultString").unwrap_or("unknown fault");
        return Err(BackendError::Protocol(format!(
            "XML-RPC fault {}: {}",
            code, message
        )));
    }
    if structs == 0 {
        return Err(malformed("reply carries no struct"));
    }

    Ok(LegacyResponse { fields })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::AccountId;
    use crate::legacy::wire::LegacyOp;

    #[test]
    fn test_encode_call_typing_and_escaping() {
        let alice = AccountId::random();
        let request = LegacyRequest::new(LegacyOp::TransferMoney)
            .with("senderID", alice)
            .with("amount", 200i64)
            .with("regionHandle", "1099511628032000")
            .with("huge", i64::from(i32::MAX) + 1)
            .with("flag", true)
            .with("description", "Tom & Jerry <3");

        let xml = encode_call(&request);

        assert!(xml.starts_with(r#"<?xml version="1.0"?><methodCall><methodName>TransferMoney</methodName>"#));
        assert!(xml.contains(&format!(
            "<member><name>senderID</name><value><string>{}</string></value></member>",
            alice
        )));
        assert!(xml.contains("<name>amount</name><value><int>200</int></value>"));
        assert!(xml.contains("<name>huge</name><value><string>2147483648</string></value>"));
        assert!(xml.contains("<name>flag</name><value><boolean>1</boolean></value>"));
        assert!(xml.contains("<string>Tom &amp; Jerry &lt;3</string>"));
        assert!(xml.ends_with("</struct></value></param></params></methodCall>"));
    }

    #[test]
    fn test_decode_typed_reply() {
        let xml = r#"<?xml version="1.0"?>
<methodResponse>
  <params><param><value><struct>
    <member><name>success</name><value><boolean>1</boolean></value></member>
    <member><name>clientBalance</name><value><i4>1200</i4></value></member>
    <member><name>message</name><value>plain &amp; untyped</value></member>
    <member><name>empty</name><value><string/></value></member>
  </struct></value></param></params>
</methodResponse>"#;

        let response = decode_response(xml).unwrap();

        assert_eq!(response.success(), Ok(true));
        assert_eq!(response.balance(), Some(1200));
        assert_eq!(response.message(), Some("plain & untyped"));
        assert_eq!(
            response.fields.get("empty"),
            Some(&LegacyValue::Str(String::new()))
        );
    }

    #[test]
    fn test_decode_refusal_keeps_success_literal() {
        let xml = "<methodResponse><params><param><value><struct>\
                   <member><name>success</name><value><boolean>0</boolean></value></member>\
                   <member><name>message</name><value><string>not enough money</string></value></member>\
                   </struct></value></param></params></methodResponse>";

        let response = decode_response(xml).unwrap();
        assert_eq!(
            response.into_result(),
            Err(BackendError::Rejected("not enough money".to_string()))
        );
    }

    #[test]
    fn test_decode_fault() {
        let xml = "<methodResponse><fault><value><struct>\
                   <member><name>faultCode</name><value><int>4</int></value></member>\
                   <member><name>faultString</name><value><string>Too many parameters.</string></value></member>\
                   </struct></value></fault></methodResponse>";

        assert_eq!(
            decode_response(xml),
            Err(BackendError::Protocol(
                "XML-RPC fault 4: Too many parameters.".to_string()
            ))
        );
    }

    #[test]
    fn test_decode_rejects_non_flat_or_garbage() {
        let nested = "<methodResponse><params><param><value><struct><member><name>a</name>\
                      <value><struct></struct></value></member></struct></value></param></params></methodResponse>";
        assert!(matches!(decode_response(nested), Err(BackendError::Protocol(_))));

        let scalar_only =
            "<methodResponse><params><param><value><boolean>1</boolean></value></param></params></methodResponse>";
        assert!(matches!(decode_response(scalar_only), Err(BackendError::Protocol(_))));

        assert!(matches!(decode_response("not xml at all"), Err(BackendError::Protocol(_))));
    }
}
