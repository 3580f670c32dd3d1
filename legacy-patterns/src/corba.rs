//! CORBA extraction: IDL interface declarations and Java client call sites.

use crate::complexity::score_corba;
use crate::model::{CorbaClientCall, CorbaInterface};
use crate::purpose::infer_business_purpose;
use chunk_prep::CodeChunk;
use regex::Regex;
use std::sync::OnceLock;

fn interface_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)interface\s+(\w+)(?:\s*:\s*[\w:,\s]+?)?\s*\{(.*?)\}\s*;").unwrap()
    })
}

fn operation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `retval name(...)` — covers `void`, scoped types, and sequences.
    RE.get_or_init(|| Regex::new(r"(?m)^\s*(?:[\w:<>,\s]+?)\s+(\w+)\s*\(").unwrap())
}

fn corba_import_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"import\s+org\.omg\.(?:CORBA|CosNaming|PortableServer)").unwrap())
}

fn narrow_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+)Helper\.narrow\(").unwrap())
}

/// Extract `interface` declarations and their operation names from IDL text.
pub(crate) fn parse_idl(file_path: &str, idl: &str) -> Vec<CorbaInterface> {
    let mut out = Vec::new();
    for caps in interface_re().captures_iter(idl) {
        let name = caps[1].to_string();
        let body = &caps[2];
        let operations: Vec<String> = operation_re()
            .captures_iter(body)
            .map(|c| c[1].to_string())
            .collect();
        out.push(CorbaInterface {
            business_purpose: infer_business_purpose(&format!("{name} {body}")),
            name,
            operations,
            file_path: file_path.to_string(),
            migration_complexity: score_corba(),
        });
    }
    out
}

/// Find Java chunks that call into CORBA, with the target interface when the
/// conventional `XxxHelper.narrow(...)` shape reveals it.
pub(crate) fn find_client_calls(chunks: &[CodeChunk]) -> Vec<CorbaClientCall> {
    let mut out = Vec::new();
    for chunk in chunks {
        let narrows: Vec<String> = narrow_re()
            .captures_iter(&chunk.text)
            .map(|c| c[1].to_string())
            .collect();
        if narrows.is_empty() && !corba_import_re().is_match(&chunk.text) {
            continue;
        }
        if narrows.is_empty() {
            out.push(CorbaClientCall {
                chunk_id: chunk.id.clone(),
                file_path: chunk.file_path.clone(),
                interface: None,
            });
        } else {
            for interface in narrows {
                out.push(CorbaClientCall {
                    chunk_id: chunk.id.clone(),
                    file_path: chunk.file_path.clone(),
                    interface: Some(interface),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDL: &str = r#"
module billing {
  interface PaymentProcessor {
    void authorize(in string account, in double amount);
    boolean capture(in string txnId);
  };

  interface RefundService : PaymentProcessor {
    void refund(in string txnId);
  };
};
"#;

    #[test]
    fn parses_interfaces_and_operations() {
        let interfaces = parse_idl("idl/billing.idl", IDL);
        assert_eq!(interfaces.len(), 2);

        assert_eq!(interfaces[0].name, "PaymentProcessor");
        assert_eq!(interfaces[0].operations, vec!["authorize", "capture"]);
        assert_eq!(
            interfaces[0].migration_complexity,
            chunk_prep::MigrationComplexity::High
        );

        assert_eq!(interfaces[1].name, "RefundService");
        assert_eq!(interfaces[1].operations, vec!["refund"]);
    }

    #[test]
    fn narrow_reveals_the_target_interface() {
        let caps = narrow_re()
            .captures("PaymentProcessor proc = PaymentProcessorHelper.narrow(objRef);")
            .unwrap();
        assert_eq!(&caps[1], "PaymentProcessor");
    }
}
