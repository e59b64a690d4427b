//! Scenarios S3 (delete authorisation), S5 (status monotonicity), and S6
//! (reply projection) — Section 8.

use relay_integration_tests::{create_conversation, create_user, dispatch_new_message, new_message_frame, open_db};
use relay_types::message::MessageStatus;

#[tokio::test]
async fn s3_only_the_author_may_delete_a_message() {
    let conn = open_db();
    let author = create_user(&conn, "author");
    let other = create_user(&conn, "other");
    let conv = create_conversation(&conn, &author.hex, &other.hex);

    let frame = new_message_frame(&conv.hex, &author.hex, None);
    let msg = dispatch_new_message(&conn, frame).expect("persist");

    // `other` attempts to delete a message authored by `author`.
    let err = relay_db::queries::messages::delete(&conn, &msg.id, &other.hex, 5_000).unwrap_err();
    match err {
        relay_db::DbError::Constraint(reason) => assert_eq!(reason, "unauthorized to delete message"),
        other => panic!("expected a constraint violation, got {other:?}"),
    }

    // The message persists.
    let still_there = relay_db::queries::messages::find_by_id(&conn, &msg.id).expect("still present");
    assert_eq!(still_there.id, msg.id);
}

#[tokio::test]
async fn s5_status_cannot_move_backwards() {
    let conn = open_db();
    let a = create_user(&conn, "A");
    let b = create_user(&conn, "B");
    let conv = create_conversation(&conn, &a.hex, &b.hex);

    let frame = new_message_frame(&conv.hex, &a.hex, None);
    let msg = dispatch_new_message(&conn, frame).expect("persist");

    let read = relay_db::queries::messages::update_status(&conn, &msg.id, MessageStatus::Read, 6_000).expect("advance to read");
    assert_eq!(read.status, MessageStatus::Read);

    let err = relay_db::queries::messages::update_status(&conn, &msg.id, MessageStatus::Delivered, 7_000).unwrap_err();
    assert!(matches!(err, relay_db::DbError::Constraint(_)));

    let unchanged = relay_db::queries::messages::find_by_id(&conn, &msg.id).expect("reload");
    assert_eq!(unchanged.status, MessageStatus::Read);
}

#[tokio::test]
async fn s6_reply_preview_swaps_sender_and_recipient_content() {
    let conn = open_db();
    let a = create_user(&conn, "A");
    let b = create_user(&conn, "B");
    let conv = create_conversation(&conn, &a.hex, &b.hex);

    // A sends m1 with senderContent = SA, recipientContent = RA.
    let m1 = dispatch_new_message(&conn, new_message_frame(&conv.hex, &a.hex, None)).expect("persist m1");
    assert_eq!(m1.sender_content.encrypted, "E2");
    assert_eq!(m1.recipient_content.encrypted, "E1");

    // B replies with m2, parent = m1.
    let m2 = dispatch_new_message(&conn, new_message_frame(&conv.hex, &b.hex, Some(&m1.id))).expect("persist m2");

    let preview = m2.reply.expect("reply carries a preview of its parent");
    assert_eq!(preview.recipient_content.encrypted, m1.sender_content.encrypted);
    assert_eq!(preview.sender_content.encrypted, m1.recipient_content.encrypted);
}
