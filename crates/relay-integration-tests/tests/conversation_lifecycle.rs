//! Scenario S1 (create, accept, send, page) and S2 (pin cap) — Section 8.

use relay_integration_tests::{create_conversation, create_user, dispatch_new_message, memory_queue, new_message_frame, open_db, publish_and_enqueue, Instance};
use relay_types::conversation::Trust;

#[tokio::test]
async fn s1_create_accept_send_and_page() {
    let conn = open_db();
    let instance = Instance::new();
    let queue = memory_queue();

    // 1. U0 creates a conversation with U1; it starts as a request.
    let u0 = create_user(&conn, "U0");
    let u1 = create_user(&conn, "U1");
    let conv = create_conversation(&conn, &u0.hex, &u1.hex);
    assert_eq!(conv.trust, Trust::Request);

    // 2. U1 accepts; the conversation becomes trusted.
    relay_db::queries::conversations::accept(&conn, &conv.hex, &u1.hex, 2_000).expect("accept");
    let accepted = relay_db::queries::conversations::find_by_hex(&conn, &conv.hex).expect("reload");
    assert_eq!(accepted.trust, Trust::Trusted);

    // 3. U0 subscribes U1's side of the topic (simulating U1's open socket)
    // and sends a `new` frame.
    let mut u1_topic = instance.channels.subscribe(&conv.hex);
    let frame = new_message_frame(&conv.hex, &u0.hex, None);
    let msg = dispatch_new_message(&conn, frame).expect("validate + persist");
    publish_and_enqueue(&instance, queue.as_ref(), &msg, vec![u0.hex.clone(), u1.hex.clone()]).await;

    // U1's subscriber receives the `new` frame for this message.
    let received = u1_topic.recv().await.expect("topic delivery");
    assert_eq!(received.message["_id"], msg.id.clone());
    assert_eq!(received.message["status"], "sent");

    // 4. Either side pages the conversation's messages and sees it.
    let page = relay_db::queries::messages::page(&conn, &conv.hex, 1, 20).expect("page");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, msg.id);
}

#[tokio::test]
async fn s2_pin_cap_rejects_a_sixth_pin() {
    let conn = open_db();
    let u0 = create_user(&conn, "U0");

    // 1. Pin five distinct conversations for U0.
    for _ in 0..5 {
        let other = create_user(&conn, "other");
        let conv = create_conversation(&conn, &u0.hex, &other.hex);
        relay_db::queries::conversations::pin(&conn, &conv.hex, &u0.hex, 5, 1_000).expect("pin");
    }

    // 2. A sixth pin is rejected with the exact message Section 8 names.
    let sixth_other = create_user(&conn, "sixth");
    let sixth_conv = create_conversation(&conn, &u0.hex, &sixth_other.hex);
    let err = relay_db::queries::conversations::pin(&conn, &sixth_conv.hex, &u0.hex, 5, 2_000).unwrap_err();
    match err {
        relay_db::DbError::Constraint(msg) => assert_eq!(msg, "cannot pin more than 5 conversations"),
        other => panic!("expected a constraint violation, got {other:?}"),
    }
}
