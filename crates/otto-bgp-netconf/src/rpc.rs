// crates/otto-bgp-netconf/src/rpc.rs
// ============================================================================
// Module: NETCONF RPC builders and framing
// Description: Juniper NETCONF-over-SSH message construction and the
// RFC 6242 `]]>]]>` end-of-message marker used by NETCONF 1.0 (section 6).
// Purpose: Keep every literal XML payload in one file so the transport layer
// only deals with bytes in, bytes out.
// Dependencies: none
// ============================================================================

/// RFC 6242 end-of-message marker for NETCONF 1.0 framing.
pub const EOM_MARKER: &str = "]]>]]>";

/// The `<hello>` this client sends, advertising base 1.0 capability only.
#[must_use]
pub fn client_hello() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <hello xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\">\n\
         <capabilities><capability>urn:ietf:params:netconf:base:1.0</capability></capabilities>\n\
         </hello>\n{EOM_MARKER}"
    )
}

fn rpc(message_id: u64, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <rpc message-id=\"{message_id}\" xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\">\n\
         {body}\n</rpc>\n{EOM_MARKER}"
    )
}

/// `<lock>` the candidate datastore.
#[must_use]
pub fn lock_candidate(message_id: u64) -> String {
    rpc(message_id, "<lock><target><candidate/></target></lock>")
}

/// `<unlock>` the candidate datastore.
#[must_use]
pub fn unlock_candidate(message_id: u64) -> String {
    rpc(message_id, "<unlock><target><candidate/></target></unlock>")
}

/// Junos `load-configuration` with `action="merge"`, `format="text"` — load
/// the policy bundle's prefix-list stanzas without replacing the rest of the
/// candidate configuration (§4.5 step 3).
#[must_use]
pub fn load_merge(message_id: u64, configuration_text: &str) -> String {
    let escaped = escape_cdata(configuration_text);
    rpc(
        message_id,
        &format!(
            "<load-configuration action=\"merge\" format=\"text\">\
             <configuration-text>{escaped}</configuration-text>\
             </load-configuration>"
        ),
    )
}

/// Junos `get-configuration` with `compare="rollback" rollback="0"` against
/// the candidate, producing a textual diff of pending changes.
#[must_use]
pub fn compare_configuration(message_id: u64) -> String {
    rpc(
        message_id,
        "<get-configuration compare=\"rollback\" rollback=\"0\" format=\"text\"/>",
    )
}

/// `<discard-changes>` — rollback the candidate to match running (§4.5 steps
/// 3/4/preview, on any early exit).
#[must_use]
pub fn discard_changes(message_id: u64) -> String {
    rpc(message_id, "<discard-changes/>")
}

/// Junos `<commit-configuration><check/></commit-configuration>` —
/// `commit-check` without committing.
#[must_use]
pub fn commit_check(message_id: u64) -> String {
    rpc(message_id, "<commit-configuration><check/></commit-configuration>")
}

/// Junos confirmed commit: `confirm=<minutes>`, synchronous, with a comment
/// (§4.5 step 4, §6).
#[must_use]
pub fn commit_confirmed(message_id: u64, hold_minutes: u32, comment: &str) -> String {
    let escaped = escape_cdata(comment);
    rpc(
        message_id,
        &format!(
            "<commit-configuration>\
             <confirmed/><confirm-timeout>{hold_minutes}</confirm-timeout>\
             <synchronous/><log>{escaped}</log>\
             </commit-configuration>"
        ),
    )
}

/// The confirming second commit: a plain commit with no `confirmed` flag,
/// making the prior confirmed commit permanent (§4.5 step 6, auto-finalize).
#[must_use]
pub fn commit_final(message_id: u64) -> String {
    rpc(message_id, "<commit-configuration/>")
}

/// Probe the management-plane RPC (`get-software-information`) as a basic
/// liveness check (§4.5 step 5).
#[must_use]
pub fn get_software_information(message_id: u64) -> String {
    rpc(message_id, "<get-software-information/>")
}

/// Probe established BGP neighbor state (`get-bgp-summary-information`)
/// (§4.5 step 5).
#[must_use]
pub fn get_bgp_summary(message_id: u64) -> String {
    rpc(message_id, "<get-bgp-summary-information/>")
}

/// `<close-session>` — graceful session teardown.
#[must_use]
pub fn close_session(message_id: u64) -> String {
    rpc(message_id, "<close-session/>")
}

/// Escape the characters XML forbids verbatim inside element content. Policy
/// content and commit comments both flow through here before embedding.
fn escape_cdata(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Whether a raw NETCONF reply indicates an `<rpc-error>`.
#[must_use]
pub fn reply_is_error(reply: &str) -> bool {
    reply.contains("<rpc-error>")
}

/// Extract the established-peer count from a `get-bgp-summary-information`
/// reply, if the field is present in the expected shape.
#[must_use]
pub fn parse_established_peer_count(reply: &str) -> Option<u32> {
    let marker = "<peer-count>";
    let start = reply.find(marker)? + marker.len();
    let end = reply[start..].find("</peer-count>")? + start;
    reply[start..end].trim().parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn every_rpc_ends_with_the_eom_marker() {
        assert!(lock_candidate(1).ends_with(EOM_MARKER));
        assert!(commit_confirmed(2, 5, "otto-bgp apply").ends_with(EOM_MARKER));
    }

    #[test]
    fn load_merge_escapes_configuration_text() {
        let xml = load_merge(1, "prefix-list AS1 { 10.0.0.0/8 <test>; }");
        assert!(xml.contains("&lt;test&gt;"));
        assert!(!xml.contains("<test>"));
    }

    #[test]
    fn reply_is_error_detects_rpc_error_element() {
        assert!(reply_is_error("<rpc-reply><rpc-error>bad</rpc-error></rpc-reply>"));
        assert!(!reply_is_error("<rpc-reply><ok/></rpc-reply>"));
    }

    #[test]
    fn parse_established_peer_count_reads_the_field() {
        let reply = "<bgp-information><peer-count>4</peer-count></bgp-information>";
        assert_eq!(parse_established_peer_count(reply), Some(4));
    }
}
