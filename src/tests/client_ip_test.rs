use crate::ctx::BodySource;
use crate::tests::common::test_ctx;
use crate::types::HttpMethods;

fn ip_for(headers: &[(&str, &str)]) -> String {
    let (ctx, _rec) = test_ctx(HttpMethods::GET, "/ip", "", headers, BodySource::Empty);
    ctx.client_ip()
}

#[test]
fn first_valid_forwarded_entry_wins() {
    assert_eq!(
        ip_for(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1, 10.0.0.2")]),
        "203.0.113.7"
    );
    assert_eq!(
        ip_for(&[("x-forwarded-for", "  203.0.113.7  ,10.0.0.1")]),
        "203.0.113.7"
    );
}

#[test]
fn invalid_forwarded_entries_are_skipped() {
    assert_eq!(
        ip_for(&[("x-forwarded-for", "unknown, 203.0.113.9")]),
        "203.0.113.9"
    );
}

#[test]
fn real_ip_is_second_choice() {
    assert_eq!(
        ip_for(&[
            ("x-forwarded-for", "not-an-ip"),
            ("x-real-ip", " 198.51.100.4 "),
        ]),
        "198.51.100.4"
    );
}

#[test]
fn invalid_real_ip_falls_through_to_remote() {
    // remote address in the test harness is 127.0.0.1:5000
    assert_eq!(ip_for(&[("x-real-ip", "bogus")]), "127.0.0.1");
}

#[test]
fn remote_port_stripping() {
    use crate::helpers::client_ip;
    use hyper::HeaderMap;
    let headers = HeaderMap::new();
    assert_eq!(client_ip(&headers, "192.0.2.1:443"), "192.0.2.1");
    assert_eq!(client_ip(&headers, "[2001:db8::1]:443"), "2001:db8::1");
    assert_eq!(client_ip(&headers, "[2001:db8::1]"), "2001:db8::1");
    assert_eq!(client_ip(&headers, "2001:db8::1"), "2001:db8::1");
    assert_eq!(client_ip(&headers, "no-port-here"), "no-port-here");
    assert_eq!(client_ip(&headers, ""), "0.0.0.0");
}

#[test]
fn forwarded_ipv6_is_accepted() {
    assert_eq!(ip_for(&[("x-forwarded-for", "2001:db8::2")]), "2001:db8::2");
}
