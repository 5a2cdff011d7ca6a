// crates/otto-bgp-bgpq4/src/command.rs
// ============================================================================
// Module: bgpq4 argument construction
// Description: Builds the `[bgpq4, -Jl, <policy_name>, AS<n>]` argv,
// optionally with `-h <host> -p <port>` for an IRR tunnel (section 6).
// Purpose: Isolate the one place that turns validated inputs into a process
// argv. No shell is ever invoked; arguments are passed as an argv array.
// Dependencies: otto-bgp-core
// ============================================================================

use otto_bgp_core::Asn;

use crate::error::Bgpq4Error;

/// A host/port pair for routing the query through an IRR SSH-tunnel proxy.
#[derive(Debug, Clone, Copy)]
pub struct TunnelEndpoint<'a> {
    /// The tunnel's local bind host.
    pub host: &'a str,
    /// The tunnel's local bind port.
    pub port: u16,
}

fn validate_token(token: &str) -> Result<(), Bgpq4Error> {
    let safe = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if safe {
        Ok(())
    } else {
        Err(Bgpq4Error::UnsafeArgument(token.to_owned()))
    }
}

/// Build the argv for one `bgpq4` invocation against `policy_name`/`asn`,
/// per the argument template in §6. Every token is validated against a
/// restrictive character set before being appended; there is no shell
/// evaluation anywhere in this path.
///
/// # Errors
/// Returns [`Bgpq4Error::UnsafeArgument`] if `policy_name` or the tunnel
/// host contains characters outside `[A-Za-z0-9._-]`.
pub fn build_argv(
    policy_name: &str,
    asn: Asn,
    tunnel: Option<TunnelEndpoint<'_>>,
) -> Result<Vec<String>, Bgpq4Error> {
    validate_token(policy_name)?;
    let mut argv = vec!["bgpq4".to_owned(), "-Jl".to_owned(), policy_name.to_owned()];
    if let Some(endpoint) = tunnel {
        validate_token(endpoint.host)?;
        argv.push("-h".to_owned());
        argv.push(endpoint.host.to_owned());
        argv.push("-p".to_owned());
        argv.push(endpoint.port.to_string());
    }
    argv.push(format!("AS{}", asn.value()));
    Ok(argv)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn builds_the_documented_argument_template() {
        let argv = build_argv("AS13335", Asn::new(13335), None).unwrap();
        assert_eq!(argv, vec!["bgpq4", "-Jl", "AS13335", "AS13335"]);
    }

    #[test]
    fn appends_tunnel_host_and_port_when_present() {
        let argv = build_argv(
            "AS13335",
            Asn::new(13335),
            Some(TunnelEndpoint { host: "127.0.0.1", port: 43001 }),
        )
        .unwrap();
        assert_eq!(
            argv,
            vec!["bgpq4", "-Jl", "AS13335", "-h", "127.0.0.1", "-p", "43001", "AS13335"]
        );
    }

    #[test]
    fn rejects_policy_name_with_shell_metacharacters() {
        let err = build_argv("AS1; rm -rf /", Asn::new(1), None).unwrap_err();
        assert!(matches!(err, Bgpq4Error::UnsafeArgument(_)));
    }

    #[test]
    fn rejects_tunnel_host_with_unsafe_characters() {
        let err = build_argv(
            "AS1",
            Asn::new(1),
            Some(TunnelEndpoint { host: "$(whoami)", port: 1 }),
        )
        .unwrap_err();
        assert!(matches!(err, Bgpq4Error::UnsafeArgument(_)));
    }
}
