use super::*;

#[test]
fn parses_copy_commands_as_zero_based_indices() {
    assert_eq!(
        parse_view_command("u 1"),
        Some(ViewCommand::Copy {
            index: 0,
            field: ExportField::Username
        })
    );
    assert_eq!(
        parse_view_command("  pass   3 "),
        Some(ViewCommand::Copy {
            index: 2,
            field: ExportField::Password
        })
    );
    assert_eq!(parse_view_command("q"), Some(ViewCommand::Quit));
}

#[test]
fn rejects_malformed_view_commands() {
    for line in ["", "u", "u 0", "p x", "p 1 2", "copy 1"] {
        assert_eq!(parse_view_command(line), None, "{line:?}");
    }
}

#[test]
fn view_subcommand_takes_a_cycle_id() {
    let cycle = CycleId::new();
    let args = Args::try_parse_from([
        "desktop",
        "--staging-db",
        "sqlite::memory:",
        "view",
        "--cycle",
        &cycle.to_string(),
    ])
    .expect("args");
    assert_eq!(args.staging_db, "sqlite::memory:");
    match args.command {
        Cmd::View { cycle: parsed } => assert_eq!(parsed, cycle),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn save_accepts_page_url_for_prefill() {
    let args = Args::try_parse_from([
        "desktop",
        "save",
        "--page-url",
        "https://example.com/login",
        "--username",
        "alice",
        "--password",
        "p@ss",
    ])
    .expect("args");
    match args.command {
        Cmd::Save {
            website, page_url, ..
        } => {
            assert_eq!(website, None);
            assert_eq!(page_url.as_deref(), Some("https://example.com/login"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

fn unused_local_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn save_runs_without_a_staging_database() {
    let client = RemoteClient::new(&unused_local_url()).expect("client");
    let err = run_save(
        Arc::new(client),
        SaveForm {
            website: None,
            page_url: Some("https://example.com/login".into()),
            username: "alice".into(),
            password: "p@ss".into(),
        },
    )
    .await
    .expect_err("nothing is listening");
    assert!(matches!(err, HandoffFlowError::Connectivity(_)));
}

#[tokio::test]
async fn save_with_missing_fields_fails_before_any_request() {
    let client = RemoteClient::new(&unused_local_url()).expect("client");
    let err = run_save(
        Arc::new(client),
        SaveForm {
            website: Some("example.com".into()),
            page_url: None,
            username: String::new(),
            password: "p@ss".into(),
        },
    )
    .await
    .expect_err("validation");
    assert!(matches!(err, HandoffFlowError::Validation(_)));
}
