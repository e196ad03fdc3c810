//! End-to-end tests: raw frames and exception chains to final text

use std::sync::Arc;

use demyst_core::prelude::*;

fn system(name: &str) -> TypeRef
{
    TypeRef::qualified("System", name)
}

fn plain() -> TraceOptions
{
    TraceOptions::default().with_markup(false).with_continuation_marker("")
}

/// `MoveNext` of the async state machine generated for lambda 2 of `MyClass.Start`.
fn async_lambda_frame() -> RawFrame
{
    let my_class = TypeRef::named("MyClass");
    let closure_class = TypeRef::named("<>c").nested_in(my_class.clone());

    let host: Arc<dyn MethodIdentity> = Arc::new(MethodRecord::new(10, "Start").declared_by(my_class));
    let lambda: Arc<dyn MethodIdentity> = Arc::new(
        MethodRecord::new(11, "<Start>b__0_2")
            .declared_by(closure_class.clone())
            .returns(system("Void"))
            .with_synthesis(SynthesisRecord::closure(Some(10)))
            .linked_to(host),
    );
    let machine = MethodRecord::new(12, "MoveNext")
        .declared_by(TypeRef::named("<<Start>b__0_2>d").nested_in(closure_class))
        .with_synthesis(SynthesisRecord::async_state_machine(Some(11)))
        .linked_to(lambda);

    RawFrame::new(Arc::new(machine))
}

fn three_frames() -> Vec<RawFrame>
{
    let do_work = MethodRecord::new(1, "DoWork")
        .declared_by(TypeRef::named("MyClass"))
        .parameter(ParameterInfo::new("count", system("Int32")));

    vec![
        RawFrame::unresolved("at native_frame_0x1234"),
        RawFrame::new(Arc::new(do_work)).with_location("/src/my.cs", Some(42)),
        async_lambda_frame(),
    ]
}

#[test]
fn test_three_frame_trace()
{
    let aggregator = TraceAggregator::new(plain());
    let document = aggregator.document(&three_frames());

    assert_eq!(document.frame_count(), 3);
    assert_eq!(
        document.plain_text(),
        "at native_frame_0x1234\nMyClass.DoWork(c) (at /src/my.cs:42)\nasync void MyClass.Start()+<Start>b__0_2()=>{…} [2]"
    );
}

#[test]
fn test_rendering_is_deterministic()
{
    let cached = TraceAggregator::new(TraceOptions::default());
    let uncached = TraceAggregator::new(TraceOptions::default().with_cache(false));

    let first = cached.format_trace(&three_frames());
    let second = cached.format_trace(&three_frames());
    let third = uncached.format_trace(&three_frames());

    assert_eq!(first, second);
    assert_eq!(first, third);
}

#[test]
fn test_rich_markup_end_to_end()
{
    let aggregator = TraceAggregator::new(TraceOptions::default());
    let text = aggregator.format_trace(&three_frames());
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "│ at native_frame_0x1234");
    assert_eq!(lines[1], "│ MyClass.<b><i>DoWork</i></b>(c) <size=8>(at /src/my.cs:42)</size>");
    assert_eq!(
        lines[2],
        "│ <i>async void</i> MyClass.<b><i>Start()+<Start>b__0_2()=>{…}</i></b> [2]"
    );
}

#[test]
fn test_compact_placeholder_letters()
{
    let method = MethodRecord::new(2, "Mix")
        .declared_by(TypeRef::named("MyClass"))
        .parameter(ParameterInfo::unnamed(system("Int32")))
        .parameter(ParameterInfo::new("bar", system("String")))
        .parameter(ParameterInfo::unnamed(system("Boolean")));

    let text = TraceAggregator::new(plain()).document(&[RawFrame::new(Arc::new(method))]).plain_text().to_string();
    assert_eq!(text, "MyClass.Mix(a, b, c)");
}

#[test]
fn test_full_params_with_tuple_names()
{
    let tuple = TypeRef::value_tuple(vec![system("Int32"), system("String")]);
    let named = MethodRecord::new(3, "Take")
        .declared_by(TypeRef::named("MyClass"))
        .parameter(ParameterInfo::new("pair", tuple.clone()).with_tuple_names([Some("x"), Some("y")]));
    let partial = MethodRecord::new(4, "Give")
        .declared_by(TypeRef::named("MyClass"))
        .returns_parameter(ParameterInfo::unnamed(tuple).with_tuple_names([Some("x")]));

    let aggregator = TraceAggregator::new(plain().with_full_params(true));
    let document = aggregator.document(&[RawFrame::new(Arc::new(named)), RawFrame::new(Arc::new(partial))]);

    assert_eq!(document.plain_text(), "MyClass.Take((int x, string y) pair)\n(int x, string) MyClass.Give()");
}

#[test]
fn test_iterator_state_machine_is_not_async()
{
    let machine = MethodRecord::new(5, "MoveNext")
        .declared_by(TypeRef::named("<Numbers>d__3").nested_in(TypeRef::qualified("App", "Counter")))
        .with_synthesis(SynthesisRecord::iterator_state_machine(None));

    let resolved = FrameResolver::without_cache().resolve(&RawFrame::new(Arc::new(machine)));
    let method = resolved.method().unwrap();
    assert_eq!(method.name, "Numbers");
    assert_eq!(method.declaring_type_name.as_deref(), Some("App.Counter"));
    assert!(!method.is_async);
    assert!(!method.is_lambda);
}

#[test]
fn test_state_machine_recognised_by_name()
{
    let machine = MethodRecord::new(6, "MoveNext").declared_by(TypeRef::named("<Run>d__1").nested_in(TypeRef::named("Worker")));
    let text = TraceAggregator::new(plain()).document(&[RawFrame::new(Arc::new(machine))]).plain_text().to_string();
    assert_eq!(text, "Worker.Run()");
}

#[test]
fn test_local_function()
{
    let local = MethodRecord::new(7, "<Main>g__Validate|0_0")
        .declared_by(TypeRef::named("Program"))
        .parameter(ParameterInfo::new("input", system("String")));

    let resolved = FrameResolver::without_cache().resolve(&RawFrame::new(Arc::new(local)));
    let method = resolved.method().unwrap();
    assert_eq!(method.name, "Main");
    assert_eq!(method.sub_method_name.as_deref(), Some("Validate"));
    assert_eq!(method.ordinal, None);
    assert!(method.is_lambda);

    let line = Formatter::new(&plain()).format_plain(&resolved);
    assert_eq!(line, "Program.Main()+Validate(i)=>{…}");
}

#[test]
fn test_generic_async_method_substitutes_arguments()
{
    let origin: Arc<dyn MethodIdentity> = Arc::new(
        MethodRecord::new(20, "Run")
            .declared_by(TypeRef::named("Worker"))
            .returns(TypeRef::qualified("System.Threading.Tasks", "Task"))
            .with_generic_arguments(vec![TypeRef::generic_parameter("T")])
            .parameter(ParameterInfo::new("value", TypeRef::generic_parameter("T"))),
    );
    let machine = MethodRecord::new(21, "MoveNext")
        .declared_by(
            TypeRef::named("<Run>d__3`1")
                .with_generic_arguments(vec![system("String")])
                .nested_in(TypeRef::named("Worker")),
        )
        .with_synthesis(SynthesisRecord::async_state_machine(Some(20)))
        .linked_to(origin);

    let text = TraceAggregator::new(plain()).document(&[RawFrame::new(Arc::new(machine))]).plain_text().to_string();
    assert_eq!(text, "async Task Worker.Run<string>(v)");
}

#[test]
fn test_truncation_at_boundary()
{
    let frames = [
        RawFrame::unresolved("at Game.Update"),
        RawFrame::unresolved("at Host.Internal.Loop"),
        RawFrame::unresolved("at Host.Main"),
    ];
    let aggregator = TraceAggregator::new(TraceOptions::default().with_boundary_marker("Host.Internal"));
    assert_eq!(aggregator.format_trace(&frames), "│ at Game.Update\n");
}

#[test]
fn test_stripped_frame_falls_back_to_raw_text()
{
    let stripped = MethodRecord::new(30, "Hidden").stripped();
    let frames = [RawFrame::new(Arc::new(stripped)).with_raw_text("at Hidden (stripped)")];
    assert_eq!(TraceAggregator::new(plain()).format_trace(&frames), "at Hidden (stripped)");
}

#[test]
fn test_exception_from_json()
{
    let json = r#"{
        "methods": [
            { "id": 1, "name": "DoWork", "declaring_type": { "name": "MyClass" },
              "parameters": [ { "name": "count", "type": { "namespace": "System", "name": "Int32" } } ] },
            { "id": 2, "name": "Load", "declaring_type": { "namespace": "App", "name": "Store" } }
        ],
        "exception": {
            "type": "InvalidOperationException",
            "message": "load failed",
            "frames": [ { "method": 1, "file": "C:\\src\\my.cs", "line": 42 } ],
            "inner": { "type": "IOException", "message": "disk", "frames": [ { "method": 2 } ] }
        },
        "call_site": [ { "text": "at Program.Main" } ]
    }"#;

    let loaded = TraceFile::from_json(json).unwrap().load().unwrap();
    let exception = loaded.exception.unwrap();
    let aggregator = TraceAggregator::new(TraceOptions::default().with_markup(false));
    let formatted = aggregator.format_exception(&exception, Some(loaded.call_site.as_slice()));

    assert_eq!(formatted.message, "InvalidOperationException: load failed");
    assert_eq!(
        formatted.stack_trace,
        "│ MyClass.DoWork(c) (at C:/src/my.cs:42)\n\
         │  ---> IOException: disk (rethrown as InvalidOperationException)\n\
         │ App.Store.Load()\n\
         │  ===> captured at:\n\
         │ at Program.Main"
    );
}

#[test]
fn test_demo_trace_file()
{
    let json = include_str!("../../../demos/async_failure.json");
    let loaded = TraceFile::from_json(json).unwrap().load().unwrap();
    let exception = loaded.exception.unwrap();

    let aggregator = TraceAggregator::new(plain().with_boundary_marker("Host.Internal"));
    let formatted = aggregator.format_exception(&exception, Some(loaded.call_site.as_slice()));
    assert_eq!(formatted.message, "InvalidOperationException: Service failed to start");

    let lines: Vec<&str> = formatted.stack_trace.lines().collect();
    assert!(lines[0].starts_with("async void App.Service.Start()+<Start>b__0_2()=>{…} [2]"));
    assert!(lines[0].ends_with("(at C:/src/Service.cs:27)"));
    assert!(lines.contains(&" ---> FormatException: Input string was not in a correct format (rethrown as InvalidOperationException)"));
    assert!(lines.contains(&"int App.Config.Loader.Parse(t, s) (at /src/Config/Loader.cs:88)"));
    assert!(lines.contains(&" ===> captured at:"));
    assert_eq!(lines.last(), Some(&"Program.Main(a) (at /src/Program.cs:9)"));
}

#[test]
fn test_boundary_ignores_later_mentions()
{
    let frames = [
        RawFrame::unresolved("at Game.Update"),
        RawFrame::unresolved("at Game.Log(Host.Internal.Context ctx)"),
        RawFrame::unresolved("at Game.Main"),
    ];
    let aggregator = TraceAggregator::new(plain().with_boundary_marker("Host.Internal"));
    assert_eq!(
        aggregator.format_trace(&frames),
        "at Game.Update\nat Game.Log(Host.Internal.Context ctx)\nat Game.Main"
    );
}

#[test]
fn test_windows_paths_without_markup()
{
    let run = MethodRecord::new(40, "Run").declared_by(TypeRef::named("A"));
    let frames = [RawFrame::new(Arc::new(run)).with_location("/src/a.cs", Some(3))];
    let aggregator = TraceAggregator::new(plain().with_path_style(PathStyle::Windows));
    assert_eq!(aggregator.format_trace(&frames), "A.Run() (at \\src\\a.cs:3)");
}

#[test]
fn test_raw_frame_text_is_not_markup()
{
    let frames = [RawFrame::unresolved("at weird\u{E003}name")];
    let aggregator = TraceAggregator::new(TraceOptions::default());
    assert_eq!(aggregator.format_trace(&frames), "│ at weirdname");
}
