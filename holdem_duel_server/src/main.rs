mod accounts;
mod config;
mod lobby;
mod registry;
mod view;

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use dashmap::{DashMap, mapref::entry::Entry};
use futures_util::{SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use holdem_duel_core::{ClientMessage, GameError, GameSession, PlayerAction, PlayerId, Seat, ServerMessage, SessionId, SessionStatus};

use crate::accounts::Accounts;
use crate::config::ServerConfig;
use crate::lobby::{Lobby, Pairing};
use crate::registry::{ServerError, ServerResult, SessionRegistry};

// 服务器全局状态
// 锁的顺序：lobby -> 单个牌局；连接表和玩家所在牌局表只做短暂的读写
struct AppState {
    config: ServerConfig,
    accounts: Accounts,
    lobby: Lobby,
    registry: SessionRegistry,
    // 将 PlayerId 映射到具体的网络连接
    connections: DashMap<PlayerId, mpsc::Sender<ServerMessage>>,
    // 玩家当前所在的牌局 (等待中或进行中)
    player_sessions: DashMap<PlayerId, SessionId>,
}

type SharedState = Arc<AppState>;

impl AppState {
    fn new(config: ServerConfig) -> Self {
        AppState {
            accounts: Accounts::new(config.starting_chips),
            config,
            lobby: Lobby::new(),
            registry: SessionRegistry::new(),
            connections: DashMap::new(),
            player_sessions: DashMap::new(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    info!("配置: {:?}", config);

    let addr = config.bind;
    let state = SharedState::new(AppState::new(config));

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(state);

    info!("服务器正在监听 {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

/// 处理 WebSocket 连接请求
async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // 创建一个 MPSC 通道，用于从其他任务接收要发送的消息
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.config.channel_capacity);

    // 启动一个新任务，专门负责将 MPSC 通道中的消息发送到 WebSocket
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("序列化消息失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });

    // 登录成功后填充
    let mut player_context: Option<PlayerId> = None;

    // 主循环，处理从客户端接收到的消息
    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else { continue };
        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(client_msg) => {
                if let Err(e) = handle_client_message(client_msg, &state, &tx, &mut player_context) {
                    send_error(&tx, &e);
                }
            }
            Err(e) => {
                warn!("解析消息失败: {}", e);
                send_error(&tx, &format!("无法解析的消息: {}", e));
            }
        }
    }

    // 客户端断开连接，执行清理工作
    if let Some(player_id) = player_context {
        handle_disconnect(&state, player_id);
    }
    info!("客户端连接关闭");
}

/// 核心消息处理逻辑
fn handle_client_message(
    msg: ClientMessage,
    state: &SharedState,
    tx: &mpsc::Sender<ServerMessage>,
    context: &mut Option<PlayerId>,
) -> ServerResult<()> {
    match msg {
        ClientMessage::JoinLobby { nickname } => {
            // 已登录的玩家在上一局结束后重新进入大厅
            if let Some(player_id) = *context {
                if let Ok(session_id) = current_session(state, player_id) {
                    let finished = state.registry.get_state(session_id).is_ok_and(|s| s.status == SessionStatus::Completed);
                    if !finished {
                        return Err(ServerError::AlreadyJoined);
                    }
                    leave_table(state, player_id);
                }
                let account = state.accounts.login(&state.accounts.nickname(player_id));
                return enter_lobby(state, player_id, account.chips);
            }

            let nickname = nickname.trim();
            if nickname.is_empty() {
                return Err(ServerError::EmptyNickname);
            }

            let account = state.accounts.login(nickname);
            match state.connections.entry(account.id) {
                Entry::Occupied(_) => return Err(ServerError::NicknameInUse(nickname.to_string())),
                Entry::Vacant(slot) => {
                    slot.insert(tx.clone());
                }
            }
            *context = Some(account.id);
            info!("玩家 {} ({}) 登录", nickname, account.id);
            send(tx, ServerMessage::Joined { your_id: account.id, nickname: nickname.to_string(), chips: account.chips });

            // 断线重连：回到还在进行的牌局
            if let Some(session_id) = state.player_sessions.get(&account.id).map(|s| *s)
                && state.registry.is_active(session_id)
            {
                let session = state.registry.set_connected(session_id, account.id, true)?;
                info!("玩家 {} 重新连回牌局 {}", account.id, session_id);
                after_transition(state, session);
                return Ok(());
            }
            enter_lobby(state, account.id, account.chips)
        }
        ClientMessage::PerformAction { action, amount } => {
            let player_id = context.ok_or(ServerError::NotJoined)?;
            let session_id = current_session(state, player_id)?;
            let action = PlayerAction::parse(&action, amount)?;

            let session = state.registry.apply_action(session_id, player_id, action)?;
            after_transition(state, session);
            Ok(())
        }
        ClientMessage::Rematch => {
            let player_id = context.ok_or(ServerError::NotJoined)?;
            let session_id = current_session(state, player_id)?;
            let finished = state.registry.get_state(session_id)?;
            if finished.status != SessionStatus::Completed {
                return Err(GameError::SessionInProgress.into());
            }
            // 对手必须还在线，没有中途离开，并且还坐在这一局上
            let opponent_online = finished.opponent_of(player_id).is_some_and(|p| {
                p.connected
                    && state.connections.contains_key(&p.id)
                    && state.player_sessions.get(&p.id).is_some_and(|s| *s == session_id)
            });
            if !opponent_online {
                return Err(ServerError::OpponentGone);
            }

            let session = state.registry.rematch(session_id, &mut rand::rng())?;
            for player in &session.players {
                state.player_sessions.insert(player.id, session.id);
            }
            after_transition(state, session);
            Ok(())
        }
        ClientMessage::Leave => {
            let player_id = context.ok_or(ServerError::NotJoined)?;
            let message = if leave_table(state, player_id) {
                "你已离开牌局，本局结束前座位保留，轮到你时自动弃牌"
            } else {
                "你已离开牌局"
            };
            send(tx, ServerMessage::Info { message: message.to_string() });
            Ok(())
        }
    }
}

/// 进入大厅：有人在等就直接开局，否则开一局等待对手
fn enter_lobby(state: &SharedState, player_id: PlayerId, chips: u32) -> ServerResult<()> {
    match state.lobby.join(Seat { id: player_id, chips }) {
        Pairing::Waiting(pending) => {
            state.player_sessions.insert(player_id, pending.id);
            send_to(state, player_id, ServerMessage::Waiting { session_id: pending.id, status: pending.status() });
        }
        Pairing::Matched { pending, guest } => {
            // 先入座的玩家当庄家
            let session = state.registry.create_session(pending.id, pending.host, guest, &mut rand::rng())?;
            for player in &session.players {
                state.player_sessions.insert(player.id, session.id);
            }
            info!("当前共有 {} 个牌局", state.registry.len());
            after_transition(state, session);
        }
    }
    Ok(())
}

fn current_session(state: &SharedState, player_id: PlayerId) -> ServerResult<SessionId> {
    state.player_sessions.get(&player_id).map(|s| *s).ok_or(ServerError::NotInSession)
}

/// 每次状态变化后：广播快照，结算已结束的牌局，
/// 轮到已断线的玩家时直接替他弃牌，否则开始行动计时。
fn after_transition(state: &SharedState, mut session: GameSession) {
    loop {
        broadcast_snapshot(state, &session);

        if session.status == SessionStatus::Completed {
            finish_session(state, &session);
            return;
        }
        let Some(actor) = session.current_player_id() else { return };
        if session.player(actor).is_some_and(|p| p.connected) {
            schedule_turn_timeout(state, &session, actor);
            return;
        }

        match state.registry.fold_if_stalled(session.id, actor, session.history.len()) {
            Ok(Some(next)) => {
                info!("玩家 {} 已断线，自动弃牌", actor);
                session = next;
            }
            Ok(None) => return,
            Err(e) => {
                warn!("自动弃牌失败: {}", e);
                return;
            }
        }
    }
}

/// 行动计时：超时后如果该玩家仍未行动，就替他弃牌
fn schedule_turn_timeout(state: &SharedState, session: &GameSession, actor: PlayerId) {
    let state = state.clone();
    let session_id = session.id;
    let moves = session.history.len();
    let timeout = state.config.action_timeout;

    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        match state.registry.fold_if_stalled(session_id, actor, moves) {
            Ok(Some(next)) => {
                info!("玩家 {} 行动超时，自动弃牌", actor);
                send_to(&state, actor, ServerMessage::Info { message: "行动超时，已自动弃牌".to_string() });
                after_transition(&state, next);
            }
            Ok(None) => {}
            // 牌局已经被移除
            Err(ServerError::SessionNotFound(_)) => {}
            Err(e) => warn!("超时弃牌失败: {}", e),
        }
    });
}

fn finish_session(state: &SharedState, session: &GameSession) {
    state.accounts.settle(session);

    let message = match (session.winner_id, &session.winning_hand) {
        (Some(winner), Some(hand)) => format!("{} 以 {} 赢得了牌局", state.accounts.nickname(winner), hand),
        (Some(winner), None) => format!("{} 赢得了牌局，对手弃牌", state.accounts.nickname(winner)),
        (None, Some(hand)) => format!("双方都是 {}，平分奖池", hand),
        (None, None) => "平分奖池".to_string(),
    };
    for player in &session.players {
        let balance = state.accounts.chips(player.id).unwrap_or(player.chips);
        send_to(state, player.id, ServerMessage::Info { message: format!("{}，你现在有 {} 筹码", message, balance) });
    }
}

/// 离开大厅或当前牌局。
///
/// 进行中的牌局座位一直保留到牌局结束，期间按断线处理，轮到他时自动弃牌。
/// 同一份筹码不能同时押在两个牌局上。返回 `true` 表示座位被保留了。
fn leave_table(state: &SharedState, player_id: PlayerId) -> bool {
    if state.lobby.leave(player_id) {
        info!("玩家 {} 离开了大厅", player_id);
    }
    let Some(session_id) = state.player_sessions.get(&player_id).map(|s| *s) else {
        return false;
    };

    if state.registry.is_active(session_id) {
        match state.registry.set_connected(session_id, player_id, false) {
            Ok(session) => after_transition(state, session),
            Err(e) => warn!("更新连接状态失败: {}", e),
        }
        // 正好轮到他时牌局已经被弃牌结束，座位不用再留
        if state.registry.is_active(session_id) {
            return true;
        }
    }
    state.player_sessions.remove(&player_id);

    // 已结束的牌局在双方都离开后移除
    let still_seated = state.player_sessions.iter().any(|entry| *entry.value() == session_id);
    if !still_seated && state.registry.remove(session_id).is_some() {
        info!("牌局 {} 已空，已被移除", session_id);
        if state.registry.is_empty() {
            info!("当前没有进行中的牌局");
        }
    }
    false
}

/// 玩家断开连接后的处理
fn handle_disconnect(state: &SharedState, player_id: PlayerId) {
    info!("玩家 {} 断开连接", player_id);
    state.connections.remove(&player_id);

    // 进行中的牌局保留座位以便重连
    if leave_table(state, player_id) {
        info!("玩家 {} 的座位保留到牌局结束", player_id);
    }
}

/// 为牌局中的每位玩家单独生成快照
fn broadcast_snapshot(state: &SharedState, session: &GameSession) {
    for player in &session.players {
        let view = view::for_viewer(session, player.id, |id| state.accounts.nickname(id));
        send_to(state, player.id, ServerMessage::GameStateSnapshot(view));
    }
}

fn send_to(state: &SharedState, player_id: PlayerId, message: ServerMessage) {
    if let Some(tx) = state.connections.get(&player_id) {
        send(&tx, message);
    }
}

fn send(tx: &mpsc::Sender<ServerMessage>, message: ServerMessage) {
    if tx.try_send(message).is_err() {
        // 发送失败，说明该玩家已断开或者处理不过来，后续由其自己的 handle_socket 任务处理
        warn!("向客户端发送消息失败（可能已断开）");
    }
}

fn send_error(tx: &mpsc::Sender<ServerMessage>, error: &impl ToString) {
    send(tx, ServerMessage::Error { message: error.to_string() });
}

#[cfg(test)]
mod tests {
    use super::*;

    // 不经过 WebSocket，直接用消息处理函数模拟一个客户端
    struct TestClient {
        id: PlayerId,
        tx: mpsc::Sender<ServerMessage>,
        rx: mpsc::Receiver<ServerMessage>,
        context: Option<PlayerId>,
    }

    impl TestClient {
        fn login(state: &SharedState, nickname: &str) -> Self {
            let (tx, rx) = mpsc::channel(64);
            let mut context = None;
            handle_client_message(ClientMessage::JoinLobby { nickname: nickname.to_string() }, state, &tx, &mut context)
                .unwrap();
            TestClient { id: context.unwrap(), tx, rx, context }
        }

        fn send(&mut self, state: &SharedState, msg: ClientMessage) -> ServerResult<()> {
            handle_client_message(msg, state, &self.tx, &mut self.context)
        }

        fn rejoin(&mut self, state: &SharedState) -> ServerResult<()> {
            let nickname = state.accounts.nickname(self.id);
            self.send(state, ClientMessage::JoinLobby { nickname })
        }

        fn last_message(&mut self) -> Option<ServerMessage> {
            let mut last = None;
            while let Ok(msg) = self.rx.try_recv() {
                last = Some(msg);
            }
            last
        }
    }

    // alice 先进大厅当庄家，bob 是大盲，翻牌前 bob 先行动
    fn setup() -> (SharedState, TestClient, TestClient, SessionId) {
        let state = SharedState::new(AppState::new(ServerConfig::default()));
        let alice = TestClient::login(&state, "alice");
        let bob = TestClient::login(&state, "bob");
        let session_id = current_session(&state, alice.id).unwrap();
        assert_eq!(current_session(&state, bob.id), Ok(session_id));
        assert!(state.registry.is_active(session_id));
        (state, alice, bob, session_id)
    }

    #[tokio::test]
    async fn test_leave_keeps_seat_until_session_ends() {
        let (state, mut alice, mut bob, session_id) = setup();

        alice.send(&state, ClientMessage::Leave).unwrap();
        assert_eq!(current_session(&state, alice.id), Ok(session_id));
        assert!(state.registry.is_active(session_id));

        // 牌局没结束之前不能带着同一份筹码再开一局
        assert_eq!(alice.rejoin(&state), Err(ServerError::AlreadyJoined));
        assert_eq!(current_session(&state, alice.id), Ok(session_id));
        assert_eq!(state.registry.len(), 1);

        // 轮到 alice 时自动弃牌
        bob.send(&state, PlayerAction::Check.into()).unwrap();
        let session = state.registry.get_state(session_id).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.winner_id, Some(bob.id));
        assert_eq!(state.accounts.chips(alice.id), Some(995));
        assert_eq!(state.accounts.chips(bob.id), Some(1005));

        // 离开的玩家不会被拉进再来一局
        assert_eq!(bob.send(&state, ClientMessage::Rematch), Err(ServerError::OpponentGone));

        alice.rejoin(&state).unwrap();
        let waiting = current_session(&state, alice.id).unwrap();
        assert_ne!(waiting, session_id);
        assert!(matches!(alice.last_message(), Some(ServerMessage::Waiting { session_id, .. }) if session_id == waiting));
    }

    #[tokio::test]
    async fn test_leave_on_own_turn_folds_immediately() {
        let (state, mut alice, mut bob, session_id) = setup();

        bob.send(&state, ClientMessage::Leave).unwrap();
        let session = state.registry.get_state(session_id).unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.winner_id, Some(alice.id));
        assert_eq!(state.accounts.chips(alice.id), Some(1010));
        assert_eq!(state.accounts.chips(bob.id), Some(990));

        bob.rejoin(&state).unwrap();
        assert_ne!(current_session(&state, bob.id), Ok(session_id));
        assert!(matches!(bob.last_message(), Some(ServerMessage::Waiting { .. })));
        assert!(matches!(alice.last_message(), Some(ServerMessage::Info { .. })));
    }

    #[tokio::test]
    async fn test_leave_from_lobby_releases_player() {
        let state = SharedState::new(AppState::new(ServerConfig::default()));
        let mut alice = TestClient::login(&state, "alice");
        assert!(current_session(&state, alice.id).is_ok());

        alice.send(&state, ClientMessage::Leave).unwrap();
        assert_eq!(current_session(&state, alice.id), Err(ServerError::NotInSession));

        // 大厅已经空了，下一个人只能等待
        let mut bob = TestClient::login(&state, "bob");
        assert!(matches!(bob.last_message(), Some(ServerMessage::Waiting { .. })));
        assert!(state.registry.is_empty());
    }
}
