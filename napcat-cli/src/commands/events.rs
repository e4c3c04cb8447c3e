//! `napcat events`

use napcat_client::NapCatClient;
use napcat_protocol::event::{MessageType, MetaKind};
use napcat_protocol::Event;
use napcat_utils::Result;

/// Print events until the peer disconnects or `count` were printed
pub async fn run(client: &NapCatClient, raw: bool, count: Option<usize>) -> Result<i32> {
    let mut printed = 0;

    if raw {
        let mut events = client.raw_events();
        while let Some(frame) = events.recv().await {
            println!("{}", frame.to_value());
            printed += 1;
            if count.is_some_and(|limit| printed >= limit) {
                break;
            }
        }
    } else {
        let mut events = client.events();
        while let Some(event) = events.next().await {
            println!("{}", describe(&event));
            printed += 1;
            if count.is_some_and(|limit| printed >= limit) {
                break;
            }
        }
    }

    tracing::debug!("printed {} events", printed);
    Ok(0)
}

/// One-line human readable summary
pub fn describe(event: &Event) -> String {
    match event {
        Event::Meta(meta) => match &meta.kind {
            MetaKind::Lifecycle { sub_type } => format!("[meta] lifecycle {:?}", sub_type),
            MetaKind::Heartbeat { status, interval } => {
                format!("[meta] heartbeat good={} interval={}ms", status.good, interval)
            }
        },
        Event::Message(msg) => {
            let sender = if msg.sender.nickname.is_empty() {
                msg.user_id.to_string()
            } else {
                format!("{}({})", msg.sender.nickname, msg.user_id)
            };
            match (&msg.message_type, &msg.group_id) {
                (MessageType::Group, Some(group)) => {
                    format!("[{}] group {} {}: {}", msg.post_type.as_str(), group, sender, msg.plain_text())
                }
                _ => format!("[{}] private {}: {}", msg.post_type.as_str(), sender, msg.plain_text()),
            }
        }
        Event::Notice(notice) => {
            let mut line = format!("[notice] {}", notice.notice_type);
            if let Some(sub_type) = &notice.sub_type {
                line.push('/');
                line.push_str(sub_type);
            }
            if let Some(group) = &notice.group_id {
                line.push_str(&format!(" group={}", group));
            }
            if let Some(user) = &notice.user_id {
                line.push_str(&format!(" user={}", user));
            }
            line
        }
        Event::Request(request) => format!(
            "[request] {:?} from {} flag={} {}",
            request.request_type, request.user_id, request.flag, request.comment
        )
        .trim_end()
        .to_string(),
        Event::Unknown(unknown) => format!("[{}] {}", unknown.post_type, unknown.raw.to_value()),
    }
}
