//! Registration through a shared contact, and the /start entry point.

mod test_helpers;

use anyhow::Result;
use taxi_bot::bot::ui_builder::{self, Markup};
use taxi_bot::bot::{Command, Outbound};
use taxi_bot::dialogue::{AddTripStep, Conversation};
use taxi_bot::repository::TaxiRepository;
use test_helpers::*;

fn requests_contact(outbound: &[Outbound]) -> bool {
    outbound.iter().any(|action| {
        matches!(
            action,
            Outbound::Send {
                markup: Some(Markup::RequestContact { .. }),
                ..
            }
        )
    })
}

#[tokio::test]
async fn test_start_asks_unregistered_user_for_contact() -> Result<()> {
    let harness = Harness::new();
    let outbound = harness.send(command(PASSENGER_CHAT, Command::Start)).await;

    assert!(requests_contact(&outbound));
    assert!(all_text(&outbound).contains("share your phone number"));
    Ok(())
}

#[tokio::test]
async fn test_own_contact_registers_user() -> Result<()> {
    let harness = Harness::new();
    harness.send(command(DRIVER_CHAT, Command::Start)).await;

    let outbound = harness
        .send(contact(DRIVER_CHAT, "+998 90 111 22 33", Some(DRIVER_CHAT)))
        .await;
    assert!(all_text(&outbound).contains("You are registered"));
    assert!(matches!(
        outbound[0],
        Outbound::Send {
            markup: Some(Markup::RemoveKeyboard),
            ..
        }
    ));

    let user = harness
        .repo
        .find_user_by_telegram_id(DRIVER_CHAT)
        .await?
        .expect("user registered");
    assert_eq!(user.phone, "+998901112233");
    assert_eq!(user.full_name, "Ali");
    assert_eq!(harness.repo.driver_chat_id(user.id).await?, Some(DRIVER_CHAT));

    // Registered users get the menu from /start
    let outbound = harness.send(command(DRIVER_CHAT, Command::Start)).await;
    assert!(!requests_contact(&outbound));
    assert!(all_text(&outbound).contains("Hello, Ali"));
    Ok(())
}

#[tokio::test]
async fn test_registering_twice_keeps_one_user() -> Result<()> {
    let harness = Harness::new();
    harness
        .send(contact(DRIVER_CHAT, "+998901112233", Some(DRIVER_CHAT)))
        .await;
    harness
        .send(contact(DRIVER_CHAT, "+998901112233", Some(DRIVER_CHAT)))
        .await;

    let user = harness.repo.find_user_by_telegram_id(DRIVER_CHAT).await?;
    assert_eq!(user.map(|u| u.id), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_foreign_contact_is_rejected() -> Result<()> {
    let harness = Harness::new();

    let outbound = harness
        .send(contact(PASSENGER_CHAT, "+998901112233", Some(OTHER_CHAT)))
        .await;
    assert_eq!(all_text(&outbound), ui_builder::contact_not_own().text);
    assert!(requests_contact(&outbound));

    // Contact cards without a Telegram account can't be verified either
    harness
        .send(contact(PASSENGER_CHAT, "+998901112233", None))
        .await;

    assert!(harness
        .repo
        .find_user_by_telegram_id(PASSENGER_CHAT)
        .await?
        .is_none());
    Ok(())
}

#[tokio::test]
async fn test_own_contact_with_bad_number_is_rejected() -> Result<()> {
    let harness = Harness::new();
    let outbound = harness
        .send(contact(PASSENGER_CHAT, "12", Some(PASSENGER_CHAT)))
        .await;

    assert_eq!(all_text(&outbound), ui_builder::invalid_phone().text);
    assert!(harness
        .repo
        .find_user_by_telegram_id(PASSENGER_CHAT)
        .await?
        .is_none());
    Ok(())
}

#[tokio::test]
async fn test_driver_features_require_registration() -> Result<()> {
    let harness = Harness::new();

    let outbound = harness.send(command(DRIVER_CHAT, Command::Add)).await;
    assert_eq!(all_text(&outbound), ui_builder::not_registered().text);
    assert_eq!(harness.state(DRIVER_CHAT).await, None);

    let outbound = harness.send(command(DRIVER_CHAT, Command::MyTrips)).await;
    assert_eq!(all_text(&outbound), ui_builder::not_registered().text);

    harness.register(DRIVER_CHAT, "Karim").await;
    harness.send(command(DRIVER_CHAT, Command::Add)).await;
    assert_eq!(
        harness.state(DRIVER_CHAT).await,
        Some(Conversation::AddTrip(AddTripStep::ChooseOrigin))
    );
    Ok(())
}

#[tokio::test]
async fn test_free_text_without_flow_gets_hint() -> Result<()> {
    let harness = Harness::new();
    let outbound = harness.send(text(PASSENGER_CHAT, "hello?")).await;

    assert_eq!(all_text(&outbound), ui_builder::free_text_hint().text);
    assert_eq!(harness.state(PASSENGER_CHAT).await, None);
    Ok(())
}

#[tokio::test]
async fn test_help_lists_commands() -> Result<()> {
    let harness = Harness::new();
    let outbound = harness.send(command(PASSENGER_CHAT, Command::Help)).await;

    let help = all_text(&outbound);
    for command in ["/start", "/search", "/add", "/mytrips", "/mybookings", "/cancel"] {
        assert!(help.contains(command), "help is missing {}", command);
    }
    Ok(())
}
