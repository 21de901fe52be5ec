//! End-to-end conversion tests
//!
//! Each test feeds a workflow document through the converter and checks the
//! ordering, verdict and generated artifacts.

use flowport_codegen::dag::Anomaly;
use flowport_codegen::expr;
use flowport_codegen::report::sha256_hex;
use flowport_codegen::{ConvertOptions, Converter, DagBuilder, Error};
use flowport_core::config::ArtifactNames;
use flowport_core::{CyclePolicy, Parser, Registry, Status, validate};
use tempfile::TempDir;

fn node(id: u32, plugin: &str, config: &str) -> String {
    format!(
        r#"    <Node ToolID="{id}">
      <GuiSettings Plugin="{plugin}"/>
      <Properties><Configuration>{config}</Configuration></Properties>
    </Node>
"#
    )
}

fn connection(from: u32, from_port: &str, to: u32, to_port: &str) -> String {
    format!(
        r#"    <Connection>
      <Origin ToolID="{from}" Connection="{from_port}"/>
      <Destination ToolID="{to}" Connection="{to_port}"/>
    </Connection>
"#
    )
}

fn document(name: &str, nodes: &[String], connections: &[String]) -> String {
    format!(
        "<AlteryxDocument yxmdVer=\"2020.1\">\n  <Nodes>\n{}  </Nodes>\n  <Connections>\n{}  </Connections>\n  <Properties><MetaInfo><Name>{}</Name></MetaInfo></Properties>\n</AlteryxDocument>\n",
        nodes.concat(),
        connections.concat(),
        name
    )
}

fn input(id: u32, path: &str) -> String {
    node(id, "AlteryxBasePluginsGui.DbFileInput.DbFileInput", &format!("<File>{path}</File>"))
}

fn output(id: u32, path: &str) -> String {
    node(id, "AlteryxBasePluginsGui.DbFileOutput.DbFileOutput", &format!("<File>{path}</File>"))
}

fn volume_workflow() -> String {
    document(
        "volume",
        &[
            input(1, "trades.csv"),
            node(
                2,
                "AlteryxBasePluginsGui.Filter.Filter",
                "<Mode>Custom</Mode><Expression>[Volume] &gt; 100000</Expression>",
            ),
            output(3, "large_trades.csv"),
        ],
        &[connection(1, "Output", 2, "Input"), connection(2, "True", 3, "Input")],
    )
}

fn converter() -> Converter {
    Converter::new(ConvertOptions::default())
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_acyclic_order_respects_dependencies() {
    // Document order deliberately differs from data-flow order.
    let xml = document(
        "diamond",
        &[
            output(1, "out.csv"),
            node(2, "Join", "<JoinInfo connection=\"Left\"><Field field=\"Id\"/></JoinInfo><JoinInfo connection=\"Right\"><Field field=\"Id\"/></JoinInfo>"),
            node(3, "Sort", "<SortInfo><Field field=\"Id\" order=\"Ascending\"/></SortInfo>"),
            input(4, "a.csv"),
            node(5, "Filter", "<Expression>[Id] &lt;&gt; 0</Expression>"),
        ],
        &[
            connection(4, "Output", 3, "Input"),
            connection(4, "Output", 5, "Input"),
            connection(3, "Output", 2, "Left"),
            connection(5, "True", 2, "Right"),
            connection(2, "Join", 1, "Input"),
        ],
    );

    let wf = Parser::new().parse_str(&xml).unwrap();
    let report = validate(&wf, Registry::global());
    let dag = DagBuilder::default().build(&wf, &report).unwrap();

    assert!(dag.order_is_topological);
    assert_eq!(dag.len(), wf.tools.len());
    for n in &dag.nodes {
        for i in &n.inputs {
            assert!(i.node < n.id, "node {} reads node {} before it runs", n.id, i.node);
        }
    }
    assert_eq!(dag.tool_order(), vec![4, 3, 5, 2, 1]);
}

#[test]
fn test_cycle_falls_back_to_ascending_ids() {
    let xml = document(
        "loop",
        &[
            node(2, "Sort", "<SortInfo><Field field=\"A\" order=\"Ascending\"/></SortInfo>"),
            node(1, "Sort", "<SortInfo><Field field=\"B\" order=\"Ascending\"/></SortInfo>"),
        ],
        &[connection(1, "Output", 2, "Input"), connection(2, "Output", 1, "Input")],
    );

    let wf = Parser::new().parse_str(&xml).unwrap();
    let report = validate(&wf, Registry::global());
    let dag = DagBuilder::default().build(&wf, &report).unwrap();

    assert!(!dag.order_is_topological);
    assert_eq!(dag.tool_order(), vec![1, 2]);
    assert!(dag
        .anomalies
        .iter()
        .any(|a| matches!(a, Anomaly::Cycle { tools } if tools == &vec![1, 2])));

    let conversion = converter().convert_str(&xml).unwrap();
    assert!(!conversion.report.order_is_topological);
    assert!(conversion.pipeline.unwrap().contains("WARNING: the workflow graph contains a cycle."));
}

#[test]
fn test_cycle_policy_fail_refuses() {
    let xml = document(
        "loop",
        &[node(1, "Sort", ""), node(2, "Sort", "")],
        &[connection(1, "Output", 2, "Input"), connection(2, "Output", 1, "Input")],
    );
    let converter = Converter::new(ConvertOptions {
        cycle_policy: CyclePolicy::Fail,
        ..Default::default()
    });

    match converter.convert_str(&xml) {
        Err(Error::CycleDetected { workflow, tools }) => {
            assert_eq!(workflow, "loop");
            assert_eq!(tools, vec![1, 2]);
        }
        other => panic!("Expected CycleDetected, got {:?}", other.map(|c| c.status())),
    }
}

// =============================================================================
// Verdicts
// =============================================================================

#[test]
fn test_volume_filter_is_auto_with_parameter() {
    let conversion = converter().convert_str(&volume_workflow()).unwrap();

    assert_eq!(conversion.status(), Status::Auto);
    let pipeline = conversion.pipeline.as_deref().unwrap();
    assert!(pipeline.contains("evaluate(df_1, \"Volume > threshold_100000\", params)"));

    let config = conversion.config.as_ref().unwrap();
    assert_eq!(
        config.parameters.get("threshold_100000"),
        Some(&serde_yaml::Value::Number(100000.into()))
    );
    assert_eq!(config.inputs["input_1"].path.as_deref(), Some("trades.csv"));
    assert_eq!(config.outputs["output_1"].path.as_deref(), Some("large_trades.csv"));
}

#[test]
fn test_deny_listed_tool_blocks_generation() {
    let xml = document(
        "shell_out",
        &[
            input(1, "in.csv"),
            node(2, "AlteryxBasePluginsGui.RunCommand.RunCommand", ""),
            output(3, "out.csv"),
        ],
        &[connection(1, "Output", 2, "Input"), connection(2, "Output", 3, "Input")],
    );

    let conversion = converter().convert_str(&xml).unwrap();
    assert!(conversion.is_blocked());
    assert!(conversion.pipeline.is_none());
    assert!(conversion.config.is_none());
    assert_eq!(conversion.report.blocking[0].id, 2);

    let dir = TempDir::new().unwrap();
    let written = conversion
        .write_artifacts(dir.path(), &ArtifactNames::default())
        .unwrap();
    assert_eq!(written, vec![dir.path().join("report.json")]);
    assert!(!dir.path().join("pipeline.py").exists());
}

#[test]
fn test_blocked_report_still_records_order_and_cycle() {
    let xml = document(
        "blocked_loop",
        &[
            node(1, "Sort", "<SortInfo><Field field=\"A\" order=\"Ascending\"/></SortInfo>"),
            node(2, "AlteryxBasePluginsGui.RunCommand.RunCommand", ""),
        ],
        &[connection(1, "Output", 2, "Input"), connection(2, "Output", 1, "Input")],
    );

    let conversion = converter().convert_str(&xml).unwrap();
    assert!(conversion.is_blocked());
    assert!(conversion.pipeline.is_none());

    let report = &conversion.report;
    assert!(!report.order_is_topological);
    assert_eq!(report.execution_order, vec![1, 2]);
    assert!(report
        .anomalies
        .iter()
        .any(|a| matches!(a, Anomaly::Cycle { tools } if tools == &vec![1, 2])));

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["order_is_topological"], false);
    assert_eq!(json["anomalies"][0]["kind"], "cycle");
}

#[test]
fn test_convert_file_fingerprints_what_it_parsed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("unnamed_flow.yxmd");
    let xml = document("", &[input(1, "in.csv"), output(2, "out.csv")], &[connection(1, "Output", 2, "Input")]);
    std::fs::write(&path, &xml).unwrap();

    let conversion = converter().convert_file(&path).unwrap();
    assert_eq!(conversion.name, "unnamed_flow");
    assert_eq!(conversion.report.source, path.display().to_string());
    assert_eq!(
        conversion.report.source_sha256.as_deref(),
        Some(sha256_hex(xml.as_bytes()).as_str())
    );
}

#[test]
fn test_unsupported_tool_is_partial_auto() {
    let xml = document(
        "sampled",
        &[input(1, "in.csv"), node(2, "Sample", ""), output(3, "out.csv")],
        &[connection(1, "Output", 2, "Input"), connection(2, "Output", 3, "Input")],
    );

    let conversion = converter().convert_str(&xml).unwrap();
    assert_eq!(conversion.status(), Status::PartialAuto);
    let pipeline = conversion.pipeline.unwrap();
    assert!(pipeline.contains("# UNSUPPORTED: Sample needs a manual translation"));
    assert!(pipeline.contains("write_table(df_2, config[\"outputs\"][\"output_1\"])"));
}

// =============================================================================
// Generation
// =============================================================================

#[test]
fn test_union_concatenates_in_encounter_order() {
    let xml = document(
        "stacked",
        &[
            input(1, "x.csv"),
            input(2, "y.csv"),
            input(3, "z.csv"),
            node(4, "AlteryxBasePluginsGui.Union.Union", ""),
            output(5, "all.csv"),
        ],
        &[
            connection(3, "Output", 4, "Input"),
            connection(1, "Output", 4, "Input"),
            connection(2, "Output", 4, "Input"),
            connection(4, "Output", 5, "Input"),
        ],
    );

    let conversion = converter().convert_str(&xml).unwrap();
    let pipeline = conversion.pipeline.unwrap();
    assert!(pipeline.contains("df_4 = pd.concat([df_3, df_1, df_2], ignore_index=True, sort=False)"));
}

#[test]
fn test_translation_is_idempotent() {
    let expressions = [
        "[Volume] > 100000",
        "[Region] = \"West\" AND [Sales] >= 10.5",
        "IIF([Qty] > 0, [Price] * [Qty], 0)",
        "IF [A] > 1 THEN \"big\" ELSEIF [A] > 0 THEN \"small\" ELSE \"none\" ENDIF",
        "NOT [Flag] OR [Order Date] != Null()",
        "([A] + [B]) / 2 <= -3",
    ];

    for original in expressions {
        let once = expr::translate(original);
        let twice = expr::translate(&once);
        assert_eq!(once, twice, "translation of {:?} is not idempotent", original);
        assert!(!once.contains('['), "bracket left in {:?}", once);
    }
}

#[test]
fn test_convert_all_writes_one_directory_per_workflow() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    std::fs::write(src.path().join("b_volume.yxmd"), volume_workflow()).unwrap();
    std::fs::write(
        src.path().join("a_blocked.yxmd"),
        document("blocked", &[node(1, "PythonTool", "")], &[]),
    )
    .unwrap();
    std::fs::write(src.path().join("notes.txt"), "not a workflow").unwrap();

    let converter = Converter::new(ConvertOptions {
        output_dir: out.path().to_path_buf(),
        ..Default::default()
    });
    let results = converter.convert_all(src.path()).unwrap();

    let names: Vec<&str> = results.iter().map(|(c, _)| c.name.as_str()).collect();
    assert_eq!(names, vec!["blocked", "volume"]);

    let volume_dir = out.path().join("volume");
    assert!(volume_dir.join("pipeline.py").exists());
    assert!(volume_dir.join("config.yaml").exists());
    let report = std::fs::read_to_string(volume_dir.join("report.json")).unwrap();
    let report: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(report["status"], "AUTO");
    assert_eq!(report["source_sha256"].as_str().unwrap().len(), 64);

    let blocked_dir = out.path().join("blocked");
    assert!(blocked_dir.join("report.json").exists());
    assert!(!blocked_dir.join("pipeline.py").exists());
}
