//! Benchmarks for message parsing and serialization.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shardchat_proto::{Message, Tags};

const PING: &str = "PING :tmi.twitch.tv";

const JOIN: &str = ":bob!bob@bob.tmi.twitch.tv JOIN #room";

const CHAT: &str = "@badge-info=subscriber/25;badges=moderator/1,subscriber/24;color=#1E90FF;display-name=Bob;emotes=;first-msg=0;flags=;id=b34ccfc7-4977-403a-8a94-33c6bac34fb8;mod=1;room-id=1337;subscriber=1;tmi-sent-ts=1507246572675;turbo=0;user-id=5;user-type=mod :bob!bob@bob.tmi.twitch.tv PRIVMSG #room :This is a longer message with more content to parse";

const USERNOTICE: &str = "@badge-info=;badges=staff/1,premium/1;color=#008000;display-name=Alice;emotes=;flags=;id=db25007f-7a18-43eb-9379-80131e44d633;login=alice;mod=0;msg-id=resub;msg-param-cumulative-months=6;msg-param-sub-plan=Prime;room-id=1337;subscriber=1;system-msg=Alice\\shas\\ssubscribed\\sfor\\s6\\smonths!;tmi-sent-ts=1507246572675;user-id=1337;user-type=staff :tmi.twitch.tv USERNOTICE #room :Great stream";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Parsing");

    for (name, line) in [
        ("ping", PING),
        ("join", JOIN),
        ("chat", CHAT),
        ("usernotice", USERNOTICE),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let msg: Message = black_box(line).parse().unwrap();
                black_box(msg)
            })
        });
    }

    group.finish();
}

fn benchmark_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Serialization");

    let chat: Message = CHAT.parse().unwrap();
    group.bench_function("chat", |b| b.iter(|| black_box(&chat).to_string()));

    let outbound = Message::privmsg("#room", "hello there").with_tag("reply-parent-msg-id", "abc");
    group.bench_function("outbound_reply", |b| b.iter(|| black_box(&outbound).to_string()));

    group.finish();
}

fn benchmark_tags(c: &mut Criterion) {
    let block = CHAT.split(' ').next().unwrap().trim_start_matches('@');
    c.bench_function("tag_block", |b| b.iter(|| Tags::parse(black_box(block)).unwrap()));
}

criterion_group!(
    benches,
    benchmark_parsing,
    benchmark_serialization,
    benchmark_tags
);
criterion_main!(benches);
