use super::*;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("wslink").chain(args.iter().copied())).expect("valid arguments")
}

#[test]
fn connection_flags_map_onto_options() {
    let cli = parse(&[
        "--uri",
        "wss://api.example.com/graphql",
        "--protocol",
        "graphql,frames",
        "--compress",
        "--encoding",
        "protobuf",
        "--keepalive-ms",
        "1500",
        "--reconnect-attempts",
        "-1",
        "--reconnect-delay-ms",
        "250",
        "--debug",
        "2",
        "query",
        "{ a }",
    ]);
    let options = cli.connection.to_options().expect("options");

    assert_eq!(options.uri, "wss://api.example.com/graphql");
    assert_eq!(options.protocols, vec!["graphql", "frames"]);
    assert!(options.compress);
    assert_eq!(options.encoding, Encoding::Protobuf);
    assert_eq!(options.keepalive, Duration::from_millis(1500));
    assert_eq!(options.reconnect_attempts, ReconnectLimit::Unlimited);
    assert_eq!(options.reconnect_delay, Duration::from_millis(250));
    assert_eq!(options.debug, 2);
}

#[test]
fn bad_uri_is_a_configuration_error() {
    let cli = parse(&["--uri", "http://example.com", "send", "PING"]);
    let err = cli.connection.to_options().expect_err("not a websocket uri");
    assert!(matches!(err, TransportError::Configuration(_)));
}

#[test]
fn query_operation_carries_name_and_variables() {
    let cli = parse(&[
        "--uri",
        "ws://localhost/graphql",
        "query",
        "query Q($id: ID) { node(id: $id) { id } }",
        "--operation-name",
        "Q",
        "--variables",
        r#"{"id": "n1"}"#,
    ]);
    let Command::Query(args) = cli.command else {
        panic!("expected query command");
    };
    let operation = build_operation(args).expect("operation");

    assert_eq!(operation.operation_name.as_deref(), Some("Q"));
    assert_eq!(operation.variables["id"], "n1");
}

#[test]
fn variables_must_be_an_object() {
    let err = parse_object("[1, 2]", "variables").expect_err("array");
    assert!(matches!(err, CliError::NotAnObject("variables")));
}

#[test]
fn send_defaults() {
    let cli = parse(&["--uri", "ws://localhost/graphql", "send", "PING"]);
    let Command::Send(args) = cli.command else {
        panic!("expected send command");
    };
    assert_eq!(args.kind, "PING");
    assert_eq!(args.data, "{}");
    assert_eq!(args.wait_ms, 1000);
}
