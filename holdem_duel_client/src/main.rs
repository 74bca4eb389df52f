use futures_util::{SinkExt, StreamExt};
use std::fmt::Write as _;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;
use uuid::Uuid;

use holdem_duel_core::{ActionOption, Card, ClientMessage, GameView, PlayerAction, PlayerId, ServerMessage, SessionStatus};

const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:25917/ws";

/// 用户输入解析后的结果
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Send(ClientMessage),
    Exit,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = Url::parse(&std::env::var("HOLDEM_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string()))?;

    println!("正在连接到: {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    println!("连接成功!");

    let (mut write, mut read) = ws_stream.split();

    // 启动一个任务来处理从服务器接收的消息
    tokio::spawn(async move {
        let mut my_id: Option<PlayerId> = None;
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(server_msg) => {
                        if let ServerMessage::Joined { your_id, .. } = &server_msg {
                            my_id = Some(*your_id);
                        }
                        println!("\n{}", render_message(&server_msg, my_id));
                        print!("> "); // 重新显示输入提示符
                        let _ = std::io::stdout().flush();
                    }
                    Err(e) => eprintln!("解析服务器消息失败: {}", e),
                },
                Ok(Message::Close(_)) => {
                    println!("\n服务器关闭了连接");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("接收消息时出错: {}", e);
                    break;
                }
            }
        }
    });

    // 主任务处理用户输入
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("--- 单挑德州扑克客户端 ---");
    println!("可用命令:");
    println!("  join <昵称>               - 登录并进入大厅");
    println!("  fold                      - 弃牌");
    println!("  check                     - 过牌");
    println!("  call                      - 跟注");
    println!("  raise <金额>              - 加注到指定总额");
    println!("  rematch                   - 和同一位对手再来一局");
    println!("  leave                     - 离开当前牌局");
    println!("  exit                      - 退出");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = stdin.next_line().await? else { break };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Ok(Command::Send(msg)) => {
                let payload = serde_json::to_string(&msg)?;
                write.send(Message::Text(payload.into())).await?;
            }
            Ok(Command::Exit) => {
                println!("正在断开连接...");
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            Err(usage) => println!("{}", usage),
        }
    }

    Ok(())
}

/// 把一行输入解析成要发送的消息，出错时返回给用户看的提示
fn parse_command(line: &str) -> Result<Command, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    let msg = match parts.as_slice() {
        ["join", nickname, ..] => ClientMessage::JoinLobby { nickname: nickname.to_string() },
        ["join"] => return Err("用法: join <昵称>".to_string()),
        ["fold"] => PlayerAction::Fold.into(),
        ["check"] => PlayerAction::Check.into(),
        ["call"] => PlayerAction::Call.into(),
        ["raise", amount] => {
            let amount: u32 = amount.parse().map_err(|_| format!("无效的金额: {}", amount))?;
            PlayerAction::Raise(amount).into()
        }
        ["raise", ..] => return Err("用法: raise <金额>".to_string()),
        ["rematch"] => ClientMessage::Rematch,
        ["leave"] => ClientMessage::Leave,
        ["exit"] | ["quit"] => return Ok(Command::Exit),
        _ => return Err(format!("未知命令: {}", line.trim())),
    };
    Ok(Command::Send(msg))
}

fn render_message(msg: &ServerMessage, my_id: Option<PlayerId>) -> String {
    match msg {
        ServerMessage::Joined { nickname, chips, .. } => format!("欢迎 {}，你有 {} 筹码", nickname, chips),
        ServerMessage::Waiting { session_id, .. } => format!("牌局 {} 正在等待对手...", short_id(*session_id)),
        ServerMessage::GameStateSnapshot(view) => render_view(view, my_id),
        ServerMessage::Info { message } => format!("[提示] {}", message),
        ServerMessage::Error { message } => format!("[错误] {}", message),
    }
}

/// 把牌局视图画成几行文本
fn render_view(view: &GameView, my_id: Option<PlayerId>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== 牌局 {} | {:?} | 奖池 {} ===", short_id(view.session_id), view.round, view.pot);
    let _ = writeln!(out, "公共牌: {}", render_cards(&view.community_cards));

    for player in &view.players {
        let mut tags = Vec::new();
        if Some(player.id) == my_id {
            tags.push("你");
        }
        if player.id == view.dealer_id {
            tags.push("庄");
        }
        if view.current_player_id == Some(player.id) {
            tags.push("行动中");
        }
        if player.folded {
            tags.push("已弃牌");
        }
        if !player.connected {
            tags.push("离线");
        }
        let last = player.last_action.map(|a| format!(" 上一手: {}", a)).unwrap_or_default();
        let _ = writeln!(
            out,
            "  {} [{}] 筹码 {} 本轮下注 {} 底牌 {}{}",
            player.nickname,
            tags.join(","),
            player.chips,
            player.current_bet,
            render_cards(&player.hand),
            last
        );
    }

    if view.status == SessionStatus::Completed {
        for result in &view.results {
            let name = view.player(result.player_id).map_or("?", |p| p.nickname.as_str());
            let hand = result.hand_rank.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string());
            let _ = writeln!(out, "  结算: {} 牌型 {} 赢得 {}", name, hand, result.winnings);
        }
        let _ = writeln!(out, "输入 rematch 再来一局，或 join 寻找新对手");
    } else if !view.legal_actions.is_empty() {
        let options: Vec<String> = view.legal_actions.iter().map(render_option).collect();
        let _ = writeln!(out, "轮到你了: {}", options.join(" / "));
    }
    out
}

fn render_option(option: &ActionOption) -> String {
    match option {
        ActionOption::Fold => "fold".to_string(),
        ActionOption::Check => "check".to_string(),
        ActionOption::Call(amount) => format!("call ({})", amount),
        ActionOption::Raise(minimum) => format!("raise <至少 {}>", minimum),
    }
}

fn render_cards(cards: &[Option<Card>]) -> String {
    cards
        .iter()
        .map(|c| c.map_or("??".to_string(), |card| card.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
