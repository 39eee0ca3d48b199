//! End-to-end runs of the agent loop against a scripted model and a
//! recording desktop.

use async_trait::async_trait;
use deskpilot_core::{AgentConfig, AgentEvent, ComputerAgent, StopReason, STOPPED_BY_USER};
use deskpilot_desktop::{Button, DesktopError, DesktopSandbox, Resolution, ScrollDirection};
use deskpilot_providers::{
    ActionCall, ComputerAction, ComputerUseProvider, Conversation, ConversationItem, ModelTurn,
    MouseButton, Point, ProviderError, SafetyCheck, TurnOptions,
};
use futures::StreamExt;
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// What the provider saw on one request
#[derive(Debug, Clone)]
struct Request {
    items: Vec<ConversationItem>,
    pending: usize,
    previous_response_id: Option<String>,
    display: (u32, u32),
}

/// Replays canned turns in order; `repeat` answers once the script runs out.
#[derive(Default)]
struct ScriptedProvider {
    turns: Mutex<VecDeque<Result<ModelTurn, String>>>,
    repeat: Option<ModelTurn>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedProvider {
    fn new(turns: Vec<Result<ModelTurn, String>>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            ..Default::default()
        }
    }

    fn repeating(turn: ModelTurn) -> Self {
        Self {
            repeat: Some(turn),
            ..Default::default()
        }
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ComputerUseProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    async fn next_turn(
        &self,
        conversation: &Conversation,
        options: &TurnOptions,
    ) -> deskpilot_providers::Result<ModelTurn> {
        self.requests.lock().unwrap().push(Request {
            items: conversation.items().to_vec(),
            pending: conversation.pending_items().len(),
            previous_response_id: conversation.last_response_id().map(String::from),
            display: (options.display.width, options.display.height),
        });

        let next = self.turns.lock().unwrap().pop_front();
        match next {
            Some(Ok(turn)) => Ok(turn),
            Some(Err(message)) => Err(ProviderError::ApiError {
                status: 500,
                message,
            }),
            None => match &self.repeat {
                Some(turn) => Ok(turn.clone()),
                None => Err(ProviderError::InvalidResponse("script exhausted".to_string())),
            },
        }
    }
}

/// Records native-space calls and serves a solid PNG of its resolution.
struct RecordingDesktop {
    resolution: Resolution,
    png: Vec<u8>,
    calls: Mutex<Vec<String>>,
    broken_screen: bool,
}

impl RecordingDesktop {
    fn new(width: u32, height: u32) -> Self {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([40, 90, 160, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();

        Self {
            resolution: Resolution::new(width, height),
            png: buffer.into_inner(),
            calls: Mutex::new(Vec::new()),
            broken_screen: false,
        }
    }

    fn record(&self, call: String) -> deskpilot_desktop::Result<()> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DesktopSandbox for RecordingDesktop {
    fn name(&self) -> &str {
        "recording"
    }

    async fn resolution(&self) -> deskpilot_desktop::Result<Resolution> {
        Ok(self.resolution)
    }

    async fn screenshot(&self) -> deskpilot_desktop::Result<Vec<u8>> {
        if self.broken_screen {
            return Err(DesktopError::CommandFailed {
                program: "import".to_string(),
                status: 1,
                stderr: "unable to open X server".to_string(),
            });
        }
        Ok(self.png.clone())
    }

    async fn move_mouse(&self, x: i32, y: i32) -> deskpilot_desktop::Result<()> {
        self.record(format!("move {x},{y}"))
    }

    async fn click_button(&self, x: i32, y: i32, button: Button) -> deskpilot_desktop::Result<()> {
        self.record(format!("click {x},{y} {button:?}"))
    }

    async fn double_click(&self, x: i32, y: i32) -> deskpilot_desktop::Result<()> {
        self.record(format!("double_click {x},{y}"))
    }

    async fn write(&self, text: &str) -> deskpilot_desktop::Result<()> {
        self.record(format!("write {text}"))
    }

    async fn press(&self, keys: &[String]) -> deskpilot_desktop::Result<()> {
        self.record(format!("press {}", keys.join("+")))
    }

    async fn scroll(&self, direction: ScrollDirection, clicks: u32) -> deskpilot_desktop::Result<()> {
        self.record(format!("scroll {direction:?} {clicks}"))
    }

    async fn drag(&self, from: (i32, i32), to: (i32, i32)) -> deskpilot_desktop::Result<()> {
        self.record(format!("drag {},{} -> {},{}", from.0, from.1, to.0, to.1))
    }
}

fn config() -> AgentConfig {
    AgentConfig {
        max_display: Resolution::new(100, 75),
        settle_delay_ms: 0,
        ..Default::default()
    }
}

fn turn(id: &str, calls: Vec<ActionCall>) -> ModelTurn {
    ModelTurn {
        response_id: Some(id.to_string()),
        calls,
        ..Default::default()
    }
}

fn final_turn(id: &str, text: &str) -> ModelTurn {
    ModelTurn {
        response_id: Some(id.to_string()),
        text: Some(text.to_string()),
        ..Default::default()
    }
}

async fn collect<P: ComputerUseProvider, D: DesktopSandbox>(
    agent: &ComputerAgent<P, D>,
    instruction: &str,
    cancel: CancellationToken,
) -> Vec<AgentEvent> {
    agent
        .stream(instruction.to_string(), cancel)
        .collect::<Vec<_>>()
        .await
}

#[tokio::test]
async fn full_run_dispatches_scaled_actions_and_feeds_back_screenshots() {
    let mut first = turn(
        "resp_1",
        vec![
            ActionCall::new(
                "call_1",
                ComputerAction::Click {
                    x: 10,
                    y: 20,
                    button: MouseButton::Left,
                },
            ),
            ActionCall::new(
                "call_2",
                ComputerAction::Type {
                    text: "hello".to_string(),
                },
            ),
        ],
    );
    first.reasoning = vec!["The search box is at the top".to_string()];

    let provider = ScriptedProvider::new(vec![Ok(first), Ok(final_turn("resp_2", "Searched."))]);
    let agent = ComputerAgent::new(provider, RecordingDesktop::new(200, 150), config())
        .await
        .unwrap();

    let events = collect(&agent, "search for rust", CancellationToken::new()).await;

    let kinds: Vec<String> = events
        .iter()
        .map(|e| serde_json::to_value(e).unwrap()["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        kinds,
        vec![
            "started",
            "reasoning",
            "action",
            "action_completed",
            "action",
            "action_completed",
            "message",
            "done"
        ]
    );
    assert_eq!(
        events.last(),
        Some(&AgentEvent::Done {
            content: "Searched.".to_string(),
            iterations: 2,
            reason: StopReason::Completed,
        })
    );

    assert_eq!(
        agent_desktop_calls(&agent),
        vec!["click 20,40 Left", "write hello"]
    );

    let requests = agent_requests(&agent);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].display, (100, 75));
    assert_eq!(requests[0].previous_response_id, None);
    assert_eq!(requests[1].previous_response_id.as_deref(), Some("resp_1"));
    assert_eq!(requests[1].pending, 2);

    let outputs: Vec<_> = requests[1]
        .items
        .iter()
        .filter_map(|item| match item {
            ConversationItem::ActionOutput(output) => Some(output),
            _ => None,
        })
        .collect();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0].call_id, "call_1");
    assert_eq!(outputs[1].call_id, "call_2");
    for output in outputs {
        assert!(output.error.is_none());
        assert_eq!((output.screenshot.width, output.screenshot.height), (100, 75));
        let decoded = image::load_from_memory(&output.screenshot.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 75));
    }
}

#[tokio::test]
async fn action_errors_are_reported_and_the_run_continues() {
    let provider = ScriptedProvider::new(vec![
        Ok(turn(
            "resp_1",
            vec![ActionCall::new(
                "call_1",
                ComputerAction::Drag {
                    path: vec![Point::new(1, 1)],
                },
            )],
        )),
        Ok(final_turn("resp_2", "Gave up on dragging.")),
    ]);
    let agent = ComputerAgent::new(provider, RecordingDesktop::new(100, 75), config())
        .await
        .unwrap();

    let events = collect(&agent, "drag the file", CancellationToken::new()).await;

    assert!(events.iter().any(|e| matches!(
        e,
        AgentEvent::ActionFailed { call_id, error }
            if call_id == "call_1" && error.contains("at least two points")
    )));
    assert!(matches!(
        events.last(),
        Some(AgentEvent::Done {
            reason: StopReason::Completed,
            ..
        })
    ));

    let requests = agent_requests(&agent);
    let failed = requests[1].items.iter().find_map(|item| match item {
        ConversationItem::ActionOutput(output) => output.error.clone(),
        _ => None,
    });
    assert!(failed.unwrap().contains("at least two points"));
    assert!(agent_desktop_calls(&agent).is_empty());
}

#[tokio::test]
async fn transport_errors_end_the_run() {
    let provider = ScriptedProvider::new(vec![Err("upstream exploded".to_string())]);
    let agent = ComputerAgent::new(provider, RecordingDesktop::new(100, 75), config())
        .await
        .unwrap();

    let outcome = agent.run("anything", CancellationToken::new()).await;
    assert_eq!(outcome.stop_reason, StopReason::Failed);
    assert!(outcome.text.contains("upstream exploded"));
}

#[tokio::test]
async fn iteration_limit_stops_a_looping_model() {
    let provider = ScriptedProvider::repeating(turn(
        "resp_n",
        vec![ActionCall::new("call_n", ComputerAction::Screenshot)],
    ));
    let agent_config = AgentConfig {
        max_iterations: 3,
        ..config()
    };
    let agent = ComputerAgent::new(provider, RecordingDesktop::new(100, 75), agent_config)
        .await
        .unwrap();

    let outcome = agent.run("loop forever", CancellationToken::new()).await;
    assert_eq!(outcome.stop_reason, StopReason::IterationLimit);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.actions, 3);
    assert_eq!(agent_requests(&agent).len(), 3);
}

#[tokio::test]
async fn cancelled_before_start_never_calls_the_model() {
    let provider = ScriptedProvider::new(vec![Ok(final_turn("resp_1", "unused"))]);
    let agent = ComputerAgent::new(provider, RecordingDesktop::new(100, 75), config())
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = agent.run("do it", cancel).await;

    assert_eq!(outcome.stop_reason, StopReason::Interrupted);
    assert_eq!(outcome.text, STOPPED_BY_USER);
    assert_eq!(outcome.iterations, 0);
    assert!(agent_requests(&agent).is_empty());
}

#[tokio::test]
async fn cancel_during_an_action_stops_without_answering_it() {
    let provider = ScriptedProvider::new(vec![Ok(turn(
        "resp_1",
        vec![ActionCall::new("call_1", ComputerAction::Wait { ms: Some(60_000) })],
    ))]);
    let agent = ComputerAgent::new(
        provider,
        RecordingDesktop::new(100, 75),
        AgentConfig {
            max_wait_ms: 60_000,
            ..config()
        },
    )
    .await
    .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let events = collect(&agent, "wait a minute", cancel).await;
    assert!(started.elapsed() < std::time::Duration::from_secs(10));

    assert!(matches!(
        events.iter().rev().nth(1),
        Some(AgentEvent::Action { call_id, .. }) if call_id == "call_1"
    ));
    assert!(!events.iter().any(|e| matches!(
        e,
        AgentEvent::ActionCompleted { .. } | AgentEvent::ActionFailed { .. }
    )));
    match events.last() {
        Some(AgentEvent::Done {
            content,
            iterations,
            reason,
        }) => {
            assert_eq!(content, STOPPED_BY_USER);
            assert_eq!(*iterations, 1);
            assert_eq!(*reason, StopReason::Interrupted);
        }
        other => panic!("expected done, got {other:?}"),
    }
    assert_eq!(agent_requests(&agent).len(), 1);
}

#[tokio::test]
async fn unacknowledged_safety_check_ends_the_run() {
    let mut call = ActionCall::new(
        "call_1",
        ComputerAction::Click {
            x: 5,
            y: 5,
            button: MouseButton::Left,
        },
    );
    call.pending_safety_checks.push(SafetyCheck {
        id: "sc_1".to_string(),
        code: Some("irrelevant_domain".to_string()),
        message: Some("The page looks unrelated to the task".to_string()),
    });

    let provider = ScriptedProvider::new(vec![Ok(turn("resp_1", vec![call.clone()]))]);
    let agent = ComputerAgent::new(provider, RecordingDesktop::new(100, 75), config())
        .await
        .unwrap();

    let events = collect(&agent, "click it", CancellationToken::new()).await;
    assert!(events
        .iter()
        .any(|e| matches!(e, AgentEvent::SafetyCheck { call_id, .. } if call_id == "call_1")));
    match events.last() {
        Some(AgentEvent::Error { content }) => {
            assert!(content.contains("The page looks unrelated to the task"))
        }
        other => panic!("expected error, got {other:?}"),
    }
    assert!(agent_desktop_calls(&agent).is_empty());

    let provider = ScriptedProvider::new(vec![
        Ok(turn("resp_1", vec![call])),
        Ok(final_turn("resp_2", "Clicked.")),
    ]);
    let trusting = AgentConfig {
        auto_acknowledge_safety_checks: true,
        ..config()
    };
    let agent = ComputerAgent::new(provider, RecordingDesktop::new(100, 75), trusting)
        .await
        .unwrap();

    let outcome = agent.run("click it", CancellationToken::new()).await;
    assert_eq!(outcome.stop_reason, StopReason::Completed);

    let requests = agent_requests(&agent);
    let acknowledged = requests[1].items.iter().find_map(|item| match item {
        ConversationItem::ActionOutput(output) => Some(output.acknowledged_safety_checks.clone()),
        _ => None,
    });
    assert_eq!(acknowledged.unwrap()[0].id, "sc_1");
}

#[tokio::test]
async fn screenshot_failure_ends_the_run() {
    let provider = ScriptedProvider::new(vec![Ok(turn(
        "resp_1",
        vec![ActionCall::new(
            "call_1",
            ComputerAction::Keypress {
                keys: vec!["ENTER".to_string()],
            },
        )],
    ))]);
    let mut desktop = RecordingDesktop::new(100, 75);
    desktop.broken_screen = true;
    let agent = ComputerAgent::new(provider, desktop, config()).await.unwrap();

    let events = collect(&agent, "press enter", CancellationToken::new()).await;
    match events.last() {
        Some(AgentEvent::Error { content }) => assert!(content.contains("unable to open X server")),
        other => panic!("expected error, got {other:?}"),
    }
}

fn agent_requests<D: DesktopSandbox>(agent: &ComputerAgent<ScriptedProvider, D>) -> Vec<Request> {
    agent.provider().requests()
}

fn agent_desktop_calls<P: ComputerUseProvider>(agent: &ComputerAgent<P, RecordingDesktop>) -> Vec<String> {
    agent.desktop().calls()
}
