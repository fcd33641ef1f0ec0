use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use engine::{
    AccountRecord, EngineError, Ledger, LedgerSnapshot, ManualClock, MemoryStore,
    PermissionConfig, PermissionEngine, RateLimitConfig, RateLimiter, ResultEngine, Role, Store,
};
use telegram_bot::{
    Category, CommandContext, CommandError, CommandRegistry, CommandResult, CommandSettings,
    CommandSpec, DispatchOutcome, Dispatcher, InboundMessage, Services, SlotSymbol, Spinner,
    Transport, TransportError, handler_fn, register_defaults,
};

const OWNER: &str = "1";
const ADMIN: &str = "2";
const GROUP: &str = "-100";

#[derive(Debug, Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    deleted: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn last_reply(&self) -> String {
        self.sent
            .lock()
            .unwrap()
            .last()
            .map(|(_, text)| text.clone())
            .unwrap_or_default()
    }

    fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, chat_id: &str, message_ref: &str) -> Result<(), TransportError> {
        self.deleted
            .lock()
            .unwrap()
            .push((chat_id.to_string(), message_ref.to_string()));
        Ok(())
    }
}

#[derive(Debug)]
struct FixedSpinner([SlotSymbol; 3]);

impl Spinner for FixedSpinner {
    fn spin(&self) -> [SlotSymbol; 3] {
        self.0
    }
}

/// Loads nothing and refuses every write.
#[derive(Debug, Default)]
struct ReadOnlyStore;

#[async_trait]
impl Store for ReadOnlyStore {
    async fn load(&self) -> ResultEngine<Option<LedgerSnapshot>> {
        Ok(None)
    }

    async fn save_accounts(&self, _: &[AccountRecord], _: DateTime<Utc>) -> ResultEngine<()> {
        Err(EngineError::Io(std::io::Error::other("read-only file system")))
    }
}

async fn explode(_ctx: CommandContext) -> CommandResult {
    panic!("handler exploded")
}

async fn fail(_ctx: CommandContext) -> CommandResult {
    Err(CommandError::Engine(EngineError::NotFound("thing".to_string())))
}

fn spec(name: &'static str, handler: Arc<dyn telegram_bot::CommandHandler>) -> CommandSpec {
    CommandSpec {
        name,
        description: "test command",
        usage: name,
        category: Category::Utility,
        min_role: Role::Citizen,
        handler,
    }
}

struct Harness {
    dispatcher: Dispatcher,
    transport: Arc<RecordingTransport>,
    clock: Arc<ManualClock>,
    ledger: Arc<Ledger>,
    permissions: Arc<PermissionEngine>,
    hits: Arc<AtomicUsize>,
}

async fn harness_on(store: Arc<dyn Store>, reels: [SlotSymbol; 3]) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let ledger = Arc::new(
        Ledger::builder()
            .store(store)
            .clock(clock.clone())
            .build()
            .await
            .unwrap(),
    );
    let permissions = Arc::new(PermissionEngine::new(
        PermissionConfig::new(OWNER).admins([ADMIN]),
        clock.clone(),
    ));
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::default(), clock.clone()));
    let transport = Arc::new(RecordingTransport::default());
    let hits = Arc::new(AtomicUsize::new(0));

    let mut registry = CommandRegistry::new();
    register_defaults(&mut registry);
    let counter = hits.clone();
    registry.register(spec(
        "count",
        handler_fn(move |_ctx: CommandContext| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), CommandError>(())
            }
        }),
    ));
    registry.register(spec("boom", handler_fn(explode)));
    registry.register(spec("fail", handler_fn(fail)));

    let services = Services::new(
        ledger.clone(),
        permissions.clone(),
        limiter,
        Arc::new(registry),
        transport.clone(),
        clock.clone(),
        Arc::new(FixedSpinner(reels)),
        CommandSettings::default(),
    );

    Harness {
        dispatcher: Dispatcher::new(Arc::new(services)),
        transport,
        clock,
        ledger,
        permissions,
        hits,
    }
}

async fn harness_with(reels: [SlotSymbol; 3]) -> Harness {
    harness_on(Arc::new(MemoryStore::new()), reels).await
}

async fn harness() -> Harness {
    harness_with([SlotSymbol::Cherry, SlotSymbol::Lemon, SlotSymbol::Orange]).await
}

fn private(sender: &str, text: &str) -> InboundMessage {
    InboundMessage {
        sender_id: sender.to_string(),
        chat_id: sender.to_string(),
        is_group: false,
        participant_id: sender.to_string(),
        text: text.to_string(),
        message_ref: "10".to_string(),
        quoted_sender_id: None,
    }
}

fn group(sender: &str, text: &str) -> InboundMessage {
    InboundMessage {
        chat_id: GROUP.to_string(),
        is_group: true,
        ..private(sender, text)
    }
}

fn replying_to(mut message: InboundMessage, quoted: &str) -> InboundMessage {
    message.quoted_sender_id = Some(quoted.to_string());
    message
}

#[tokio::test]
async fn muted_users_have_their_group_messages_deleted() {
    let h = harness().await;
    h.permissions.mute("9", GROUP, ADMIN).unwrap();

    assert_eq!(
        h.dispatcher.dispatch(group("9", ".count")).await,
        DispatchOutcome::MutedMessageDeleted
    );
    assert_eq!(
        h.dispatcher.dispatch(group("9", "just chatting")).await,
        DispatchOutcome::MutedMessageDeleted
    );
    assert_eq!(h.transport.deleted().len(), 2);
    assert_eq!(h.transport.deleted()[0], (GROUP.to_string(), "10".to_string()));
    assert_eq!(h.hits.load(Ordering::SeqCst), 0);
    assert!(h.transport.sent().is_empty());

    // The mute is scoped to the group.
    assert_eq!(
        h.dispatcher.dispatch(private("9", ".count")).await,
        DispatchOutcome::Handled
    );

    h.permissions.unmute("9", GROUP, ADMIN).unwrap();
    assert_eq!(
        h.dispatcher.dispatch(group("9", ".count")).await,
        DispatchOutcome::Handled
    );
    assert_eq!(h.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn plain_text_and_unknown_commands_are_silent() {
    let h = harness().await;
    assert_eq!(
        h.dispatcher.dispatch(private("9", "hello")).await,
        DispatchOutcome::NotACommand
    );
    assert_eq!(
        h.dispatcher.dispatch(private("9", ".nope")).await,
        DispatchOutcome::UnknownCommand
    );
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn citizens_are_rate_limited_and_admins_bypass() {
    let h = harness().await;
    for _ in 0..10 {
        assert_eq!(
            h.dispatcher.dispatch(private("9", ".count")).await,
            DispatchOutcome::Handled
        );
    }
    assert_eq!(
        h.dispatcher.dispatch(private("9", ".count")).await,
        DispatchOutcome::RateLimited
    );
    assert!(h.transport.last_reply().contains("Slow down"));
    assert_eq!(h.hits.load(Ordering::SeqCst), 10);

    for user in [ADMIN, OWNER] {
        for _ in 0..15 {
            assert_eq!(
                h.dispatcher.dispatch(private(user, ".count")).await,
                DispatchOutcome::Handled
            );
        }
    }

    h.permissions.grant_sudo("8", ADMIN, 60).unwrap();
    for _ in 0..15 {
        assert_eq!(
            h.dispatcher.dispatch(private("8", ".count")).await,
            DispatchOutcome::Handled
        );
    }

    h.clock.advance(Duration::seconds(61));
    assert_eq!(
        h.dispatcher.dispatch(private("9", ".count")).await,
        DispatchOutcome::Handled
    );
}

#[tokio::test]
async fn permission_denied_names_the_required_role() {
    let h = harness().await;
    assert_eq!(
        h.dispatcher.dispatch(group("9", ".mute 5")).await,
        DispatchOutcome::PermissionDenied {
            required: Role::Admin
        }
    );
    let reply = h.transport.last_reply();
    assert!(reply.contains(Role::Admin.label()));
    assert!(reply.contains(Role::Citizen.label()));

    assert_eq!(
        h.dispatcher.dispatch(private(ADMIN, ".addadmin 5")).await,
        DispatchOutcome::PermissionDenied {
            required: Role::Owner
        }
    );
}

#[tokio::test]
async fn owner_overrides_change_command_requirements() {
    let h = harness().await;
    assert_eq!(
        h.dispatcher
            .dispatch(private(OWNER, ".commandrole count admin"))
            .await,
        DispatchOutcome::Handled
    );
    assert_eq!(
        h.dispatcher.dispatch(private("9", ".count")).await,
        DispatchOutcome::PermissionDenied {
            required: Role::Admin
        }
    );
    assert_eq!(
        h.dispatcher.dispatch(private(ADMIN, ".count")).await,
        DispatchOutcome::Handled
    );

    h.dispatcher
        .dispatch(private(OWNER, ".commandrole count reset"))
        .await;
    assert_eq!(
        h.dispatcher.dispatch(private("9", ".count")).await,
        DispatchOutcome::Handled
    );

    h.dispatcher
        .dispatch(private(OWNER, ".commandrole nosuch admin"))
        .await;
    assert!(h.transport.last_reply().contains("Unknown command"));
}

#[tokio::test]
async fn handler_panics_and_errors_become_generic_replies() {
    let h = harness().await;
    assert_eq!(
        h.dispatcher.dispatch(private("9", ".boom")).await,
        DispatchOutcome::Failed
    );
    assert!(h.transport.last_reply().contains("Something went wrong"));

    assert_eq!(
        h.dispatcher.dispatch(private("9", ".fail")).await,
        DispatchOutcome::Failed
    );

    // The dispatcher keeps working.
    assert_eq!(
        h.dispatcher.dispatch(private("9", ".count")).await,
        DispatchOutcome::Handled
    );
}

#[tokio::test]
async fn missing_arguments_reply_with_usage() {
    let h = harness().await;
    assert_eq!(
        h.dispatcher.dispatch(private("9", ".pay")).await,
        DispatchOutcome::Handled
    );
    assert!(h.transport.last_reply().contains("Usage: .pay <user> <amount>"));
}

#[tokio::test]
async fn pay_and_daily_go_through_the_ledger() {
    let h = harness().await;

    h.dispatcher.dispatch(private("9", ".balance")).await;
    assert!(h.transport.last_reply().contains("1,000"));

    h.dispatcher.dispatch(private("9", ".pay @42 300")).await;
    assert!(h.transport.last_reply().contains("700"));
    assert_eq!(h.ledger.balance("42").await.value, 1300);

    h.dispatcher
        .dispatch(replying_to(group("9", ".pay 100"), "42"))
        .await;
    assert_eq!(h.ledger.balance("42").await.value, 1400);

    h.dispatcher.dispatch(private("9", ".pay 42 5000")).await;
    assert!(h.transport.last_reply().contains("Insufficient funds"));
    assert_eq!(h.ledger.balance("9").await.value, 600);

    h.dispatcher.dispatch(private("9", ".pay 9 10")).await;
    assert!(h.transport.last_reply().contains("cannot pay yourself"));

    h.dispatcher.dispatch(private("9", ".daily")).await;
    assert_eq!(h.ledger.balance("9").await.value, 700);
    h.dispatcher.dispatch(private("9", ".daily")).await;
    assert!(h.transport.last_reply().contains("Already claimed"));
    assert_eq!(h.ledger.balance("9").await.value, 700);
}

#[tokio::test]
async fn payments_and_lookups_need_a_numeric_user_id() {
    let h = harness().await;

    assert_eq!(
        h.dispatcher.dispatch(private("9", ".pay @alice 300")).await,
        DispatchOutcome::Handled
    );
    assert!(h.transport.last_reply().contains("Usage: .pay <user> <amount>"));
    assert!(h.ledger.account("alice").is_none());
    assert_eq!(h.ledger.balance("9").await.value, 1000);

    h.dispatcher.dispatch(private("9", ".balance ghost")).await;
    assert!(h.transport.last_reply().contains("Usage: .balance [user]"));

    // Looking at someone else's balance does not open their account.
    h.dispatcher.dispatch(private("9", ".balance 77")).await;
    assert!(h.transport.last_reply().contains("no account yet"));
    assert!(h.ledger.account("77").is_none());

    let stats = h.ledger.stats();
    assert_eq!(stats.total_users, 1);
    assert_eq!(stats.total_balance, 1000);

    h.dispatcher.dispatch(private("9", ".pay @77 250")).await;
    h.dispatcher.dispatch(private("9", ".balance @77")).await;
    assert!(h.transport.last_reply().contains("Balance of 77: 💰 1,250 cc"));
}

#[tokio::test]
async fn unsaved_changes_are_applied_and_flagged_in_the_reply() {
    let h = harness_on(Arc::new(ReadOnlyStore), [SlotSymbol::Cherry; 3]).await;

    assert_eq!(
        h.dispatcher.dispatch(private("9", ".daily")).await,
        DispatchOutcome::Handled
    );
    let reply = h.transport.last_reply();
    assert!(reply.contains("You claimed"));
    assert!(reply.contains("could not be saved yet"));
    assert_eq!(h.ledger.account("9").unwrap().balance, 1100);

    assert_eq!(
        h.dispatcher.dispatch(private("9", ".pay 42 300")).await,
        DispatchOutcome::Handled
    );
    let reply = h.transport.last_reply();
    assert!(reply.contains("Sent"));
    assert!(reply.contains("could not be saved yet"));
    assert_eq!(h.ledger.account("9").unwrap().balance, 800);
    assert_eq!(h.ledger.account("42").unwrap().balance, 1300);

    // Rejections never carry the warning.
    h.dispatcher.dispatch(private("9", ".pay 42 5000")).await;
    assert!(!h.transport.last_reply().contains("could not be saved yet"));
}

#[tokio::test]
async fn slots_debit_the_bet_and_pay_three_of_a_kind() {
    let h = harness_with([SlotSymbol::Target; 3]).await;
    h.dispatcher.dispatch(private("9", ".slots 10")).await;
    assert_eq!(h.ledger.balance("9").await.value, 1000 - 10 + 500);
    assert!(h.transport.last_reply().contains("🎯 🎯 🎯"));

    let h = harness().await;
    h.dispatcher.dispatch(private("9", ".slots 100")).await;
    assert_eq!(h.ledger.balance("9").await.value, 900);

    h.dispatcher.dispatch(private("9", ".slots 5")).await;
    h.dispatcher.dispatch(private("9", ".slots 5000")).await;
    assert_eq!(h.ledger.balance("9").await.value, 900);
}

#[tokio::test]
async fn admins_adjust_balances() {
    let h = harness().await;
    h.dispatcher
        .dispatch(private(ADMIN, ".currency give 9 250"))
        .await;
    assert_eq!(h.ledger.balance("9").await.value, 1250);

    h.dispatcher
        .dispatch(private(ADMIN, ".currency take 9 2000"))
        .await;
    assert_eq!(h.ledger.balance("9").await.value, 1250);

    h.dispatcher
        .dispatch(private(ADMIN, ".currency set 9 0"))
        .await;
    assert_eq!(h.ledger.balance("9").await.value, 0);
}

#[tokio::test]
async fn moderation_commands() {
    let h = harness().await;

    h.dispatcher.dispatch(private(ADMIN, ".mute 9")).await;
    assert!(h.transport.last_reply().contains("only work in groups"));

    h.dispatcher
        .dispatch(replying_to(group(ADMIN, ".mute"), "9"))
        .await;
    assert!(h.permissions.is_muted("9", GROUP));

    h.dispatcher.dispatch(group(ADMIN, ".mute 1")).await;
    assert!(!h.permissions.is_muted(OWNER, GROUP));

    h.dispatcher.dispatch(group(ADMIN, ".mutelist")).await;
    assert!(h.transport.last_reply().contains('9'));

    h.dispatcher.dispatch(group(ADMIN, ".unmute 9")).await;
    assert!(!h.permissions.is_muted("9", GROUP));
}

#[tokio::test]
async fn sudo_commands() {
    let h = harness().await;

    h.dispatcher.dispatch(private(ADMIN, ".setsudo 5 30")).await;
    assert_eq!(h.permissions.effective_role("5"), Role::Admin);

    h.dispatcher.dispatch(private(ADMIN, ".sudolist")).await;
    assert!(h.transport.last_reply().contains("30 min left"));

    h.dispatcher.dispatch(private(ADMIN, ".setsudo 6 5000")).await;
    assert!(h.transport.last_reply().contains("between 1 and 1440"));

    // Temporary admins cannot hand out sudo themselves.
    h.dispatcher.dispatch(private("5", ".setsudo 7")).await;
    assert_eq!(h.permissions.effective_role("7"), Role::Citizen);

    h.dispatcher.dispatch(private(ADMIN, ".delsudo 5")).await;
    assert_eq!(h.permissions.effective_role("5"), Role::Citizen);
}

#[tokio::test]
async fn menu_lists_only_runnable_commands() {
    let h = harness().await;

    h.dispatcher.dispatch(private("9", ".menu")).await;
    let citizen_menu = h.transport.last_reply();
    assert!(citizen_menu.contains(".balance"));
    assert!(!citizen_menu.contains(".mute"));
    assert!(!citizen_menu.contains(".addadmin"));

    h.dispatcher.dispatch(private(OWNER, ".menu")).await;
    let owner_menu = h.transport.last_reply();
    assert!(owner_menu.contains(".mute"));
    assert!(owner_menu.contains(".addadmin"));
}

#[tokio::test]
async fn calc_and_eval_share_the_evaluator() {
    let h = harness().await;

    h.dispatcher.dispatch(private("9", ".calc 2 + 3 * 4")).await;
    assert!(h.transport.last_reply().ends_with("= 14"));

    h.dispatcher.dispatch(private("9", ".calc 1 / 0")).await;
    assert!(h.transport.last_reply().contains("division by zero"));

    h.dispatcher.dispatch(private(OWNER, ".eval 2 ^ 10")).await;
    assert!(h.transport.last_reply().ends_with("= 1024"));
}

#[tokio::test]
async fn owner_manages_admins_at_runtime() {
    let h = harness().await;
    h.dispatcher.dispatch(private(OWNER, ".addadmin 5")).await;
    assert_eq!(h.permissions.role_of("5"), Role::Admin);

    h.dispatcher.dispatch(private(OWNER, ".removeadmin 5")).await;
    assert_eq!(h.permissions.role_of("5"), Role::Citizen);

    h.dispatcher.dispatch(private(OWNER, ".removeadmin 5")).await;
    assert!(h.transport.last_reply().contains("not an admin"));
}
