//! Scenario S4 (cross-instance delivery) — Section 8.
//!
//! Two daemon instances share one database and one delivery queue (as they
//! would in a real deployment, via Redis) but each owns its own connection
//! registry and channel hub. A message sent on instance B reaches a user
//! connected only to instance A's `/events` socket via the queue, not the
//! topic.

use relay_integration_tests::{create_conversation, create_user, dispatch_new_message, memory_queue, new_message_frame, open_db, publish_and_enqueue, Instance};

#[tokio::test]
async fn s4_delivers_through_the_queue_to_a_user_on_another_instance() {
    let conn = open_db();
    let queue = memory_queue();

    let u0 = create_user(&conn, "U0"); // connected to instance A, /events only
    let u1 = create_user(&conn, "U1"); // connected to instance B, /chat/:hex
    let conv = create_conversation(&conn, &u0.hex, &u1.hex);

    let instance_a = Instance::new();
    let instance_b = Instance::new();

    // U0's global registration on instance A.
    let (handle_a, mut events_rx) = instance_a.registry.new_connection();
    instance_a.registry.add(&u0.hex, handle_a);

    // Nobody is subscribed to the conversation topic on instance B; U1 sends
    // a new message there anyway.
    let frame = new_message_frame(&conv.hex, &u1.hex, None);
    let msg = dispatch_new_message(&conn, frame).expect("persist on instance B");
    publish_and_enqueue(&instance_b, queue.as_ref(), &msg, vec![u0.hex.clone(), u1.hex.clone()]).await;

    // Instance A's worker drains the queue and pushes to its local registry.
    let job = queue.dequeue().await.expect("job enqueued for cross-instance delivery");
    assert_eq!(job.to, vec![u0.hex.clone(), u1.hex.clone()]);
    for recipient in &job.to {
        let outbound = relay_types::OutboundFrame::new(job.data.kind, job.data.message.clone());
        instance_a.registry.send_to(recipient, outbound);
    }

    // U0 receives it on `/events`, without ever having subscribed to the
    // conversation topic.
    let received = events_rx.recv().await.expect("U0 receives via the registry");
    assert_eq!(received.message["_id"], msg.id);
}
