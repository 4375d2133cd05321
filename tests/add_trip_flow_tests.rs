//! Driver add-trip flow, driven through the router.

mod test_helpers;

use anyhow::Result;
use chrono::{Duration, NaiveTime};
use taxi_bot::bot::callbacks::callback_data::CallbackData;
use taxi_bot::bot::ui_builder;
use taxi_bot::bot::Command;
use taxi_bot::dialogue::{AddTripStep, Conversation};
use taxi_bot::locations::LocationId;
use test_helpers::*;

const TOSHKENT: LocationId = LocationId(0);
const DENOV: LocationId = LocationId(4);
const SHEROBOD: LocationId = LocationId(5);
const BOYSUN: LocationId = LocationId(6);

async fn registered_driver() -> Harness {
    let harness = Harness::new();
    harness.register(DRIVER_CHAT, "Karim").await;
    harness
}

fn press(data: CallbackData) -> taxi_bot::bot::Envelope {
    callback(DRIVER_CHAT, data)
}

/// Drives the flow from /add to the price prompt on a Denov → Toshkent route
async fn reach_price_step(harness: &Harness) {
    harness.send(command(DRIVER_CHAT, Command::Add)).await;
    harness.send(press(CallbackData::AddOrigin(DENOV))).await;
    harness.send(press(CallbackData::AddDestination(TOSHKENT))).await;
    harness.send(press(CallbackData::PickupsDone)).await;
    let tomorrow = harness.today() + Duration::days(1);
    harness.send(press(CallbackData::SelectDate(tomorrow))).await;
    harness.send(press(CallbackData::SelectHour(8))).await;
}

#[tokio::test]
async fn test_full_flow_publishes_trip() -> Result<()> {
    let harness = registered_driver().await;
    let tomorrow = harness.today() + Duration::days(1);

    harness.send(command(DRIVER_CHAT, Command::Add)).await;
    harness.send(press(CallbackData::AddOrigin(DENOV))).await;

    // Regional center destination: pickups come next
    let outbound = harness.send(press(CallbackData::AddDestination(TOSHKENT))).await;
    let keyboard = last_keyboard(&outbound).expect("pickup keyboard");
    assert!(keyboard.contains(&CallbackData::TogglePickup(SHEROBOD)));
    assert!(!keyboard.contains(&CallbackData::TogglePickup(DENOV)));
    assert!(!keyboard.contains(&CallbackData::TogglePickup(TOSHKENT)));

    harness.send(press(CallbackData::TogglePickup(SHEROBOD))).await;
    harness.send(press(CallbackData::TogglePickup(BOYSUN))).await;
    harness.send(press(CallbackData::TogglePickup(SHEROBOD))).await;
    harness.send(press(CallbackData::PickupsDone)).await;

    harness.send(press(CallbackData::SelectDate(tomorrow))).await;
    harness.send(press(CallbackData::SelectHour(8))).await;

    let outbound = harness.send(text(DRIVER_CHAT, "80 000")).await;
    let keyboard = last_keyboard(&outbound).expect("model keyboard");
    assert!(keyboard.contains(&CallbackData::SelectModel(0)));

    harness.send(press(CallbackData::SelectModel(0))).await;
    harness.send(press(CallbackData::SelectColor(1))).await;
    let outbound = harness.send(press(CallbackData::SelectTotalSeats(4))).await;
    assert!(all_text(&outbound).contains("Trip published"));

    let trips = harness.repo.all_trips();
    assert_eq!(trips.len(), 1);
    let trip = &trips[0];
    assert_eq!(trip.from_district, "Denov");
    assert_eq!(trip.to_district, "Toshkent");
    assert_eq!(trip.pickup_districts, vec!["Boysun".to_string()]);
    assert_eq!(trip.departure_date, tomorrow);
    assert_eq!(trip.departure_time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    assert_eq!(trip.price_per_seat, 80_000);
    assert_eq!(trip.car_model, ui_builder::VEHICLE_MODELS[0]);
    assert_eq!(trip.car_color, ui_builder::VEHICLE_COLORS[1]);
    assert_eq!(trip.total_seats, 4);
    assert_eq!(trip.occupied_seats, 0);
    assert_eq!(trip.driver_chat_id, Some(DRIVER_CHAT));
    assert_eq!(trip.driver_id, Some(1));
    assert!(trip.is_active);

    assert_eq!(harness.state(DRIVER_CHAT).await, None);
    Ok(())
}

#[tokio::test]
async fn test_district_destination_skips_pickups() -> Result<()> {
    let harness = registered_driver().await;
    harness.send(command(DRIVER_CHAT, Command::Add)).await;
    harness.send(press(CallbackData::AddOrigin(TOSHKENT))).await;
    harness.send(press(CallbackData::AddDestination(DENOV))).await;

    match harness.state(DRIVER_CHAT).await {
        Some(Conversation::AddTrip(AddTripStep::ChooseDate { itinerary })) => {
            assert!(itinerary.pickups.is_empty());
            assert_eq!(itinerary.route.origin, TOSHKENT);
            assert_eq!(itinerary.route.destination, DENOV);
        }
        other => panic!("expected date step, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_pickup_toggle_redraws_selection() -> Result<()> {
    let harness = registered_driver().await;
    harness.send(command(DRIVER_CHAT, Command::Add)).await;
    harness.send(press(CallbackData::AddOrigin(DENOV))).await;
    harness.send(press(CallbackData::AddDestination(TOSHKENT))).await;

    let outbound = harness.send(press(CallbackData::TogglePickup(BOYSUN))).await;
    assert!(all_text(&outbound).contains("Selected: Boysun"));

    let outbound = harness.send(press(CallbackData::TogglePickup(BOYSUN))).await;
    assert!(all_text(&outbound).contains("Selected: none"));

    // Route endpoints are not pickup points
    let outbound = harness.send(press(CallbackData::TogglePickup(DENOV))).await;
    assert_eq!(
        callback_answer(&outbound),
        Some((Some(ui_builder::STALE_BUTTON), true))
    );
    Ok(())
}

#[tokio::test]
async fn test_price_must_be_valid() -> Result<()> {
    let harness = registered_driver().await;
    reach_price_step(&harness).await;
    assert!(matches!(
        harness.state(DRIVER_CHAT).await,
        Some(Conversation::AddTrip(AddTripStep::EnterPrice { .. }))
    ));

    let outbound = harness.send(text(DRIVER_CHAT, "cheap")).await;
    assert_eq!(
        all_text(&outbound),
        ui_builder::invalid_price("price-not-a-number").text
    );

    let outbound = harness.send(text(DRIVER_CHAT, "500")).await;
    assert_eq!(
        all_text(&outbound),
        ui_builder::invalid_price("price-out-of-range").text
    );

    assert!(matches!(
        harness.state(DRIVER_CHAT).await,
        Some(Conversation::AddTrip(AddTripStep::EnterPrice { .. }))
    ));

    harness.send(text(DRIVER_CHAT, "45000")).await;
    assert!(matches!(
        harness.state(DRIVER_CHAT).await,
        Some(Conversation::AddTrip(AddTripStep::ChooseModel { price: 45_000, .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_dates_and_hours_outside_slate_are_refused() -> Result<()> {
    let harness = registered_driver().await;
    harness.send(command(DRIVER_CHAT, Command::Add)).await;
    harness.send(press(CallbackData::AddOrigin(TOSHKENT))).await;
    harness.send(press(CallbackData::AddDestination(DENOV))).await;

    let too_late = harness.today() + Duration::days(ui_builder::DATE_WINDOW_DAYS);
    let outbound = harness.send(press(CallbackData::SelectDate(too_late))).await;
    assert_eq!(
        callback_answer(&outbound),
        Some((Some(ui_builder::STALE_BUTTON), true))
    );

    harness.send(press(CallbackData::SelectDate(harness.today()))).await;
    let outbound = harness.send(press(CallbackData::SelectHour(23))).await;
    assert_eq!(
        callback_answer(&outbound),
        Some((Some(ui_builder::STALE_BUTTON), true))
    );
    assert!(matches!(
        harness.state(DRIVER_CHAT).await,
        Some(Conversation::AddTrip(AddTripStep::ChooseTime { .. }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_text_at_button_step_points_to_buttons() -> Result<()> {
    let harness = registered_driver().await;
    harness.send(command(DRIVER_CHAT, Command::Add)).await;

    let outbound = harness.send(text(DRIVER_CHAT, "Denov")).await;
    assert_eq!(all_text(&outbound), ui_builder::use_buttons_hint().text);
    assert_eq!(
        harness.state(DRIVER_CHAT).await,
        Some(Conversation::AddTrip(AddTripStep::ChooseOrigin))
    );
    Ok(())
}

#[tokio::test]
async fn test_cancel_clears_flow_and_add_restarts() -> Result<()> {
    let harness = registered_driver().await;
    reach_price_step(&harness).await;

    let outbound = harness.send(command(DRIVER_CHAT, Command::Cancel)).await;
    assert!(all_text(&outbound).contains("Cancelled"));
    assert_eq!(harness.state(DRIVER_CHAT).await, None);

    let outbound = harness.send(command(DRIVER_CHAT, Command::Cancel)).await;
    assert_eq!(all_text(&outbound), ui_builder::nothing_to_cancel().text);

    harness.send(command(DRIVER_CHAT, Command::Add)).await;
    assert_eq!(
        harness.state(DRIVER_CHAT).await,
        Some(Conversation::AddTrip(AddTripStep::ChooseOrigin))
    );

    // Price text no longer means anything
    let outbound = harness.send(text(DRIVER_CHAT, "80000")).await;
    assert_eq!(all_text(&outbound), ui_builder::use_buttons_hint().text);
    assert!(harness.repo.all_trips().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cancel_button_returns_to_menu() -> Result<()> {
    let harness = registered_driver().await;
    harness.send(command(DRIVER_CHAT, Command::Add)).await;

    let outbound = harness.send(press(CallbackData::Cancel)).await;
    assert!(all_text(&outbound).contains("Cancelled"));
    let keyboard = last_keyboard(&outbound).expect("menu keyboard");
    assert!(keyboard.contains(&CallbackData::Menu(
        taxi_bot::bot::callbacks::callback_data::MenuItem::AddTrip
    )));
    assert_eq!(harness.state(DRIVER_CHAT).await, None);
    Ok(())
}

#[tokio::test]
async fn test_another_command_abandons_flow() -> Result<()> {
    let harness = registered_driver().await;
    reach_price_step(&harness).await;

    harness.send(command(DRIVER_CHAT, Command::Search)).await;
    assert!(matches!(
        harness.state(DRIVER_CHAT).await,
        Some(Conversation::Search(_))
    ));

    // Add-trip buttons from the abandoned flow are stale now
    let outbound = harness.send(press(CallbackData::SelectModel(0))).await;
    assert_eq!(
        callback_answer(&outbound),
        Some((Some(ui_builder::STALE_BUTTON), true))
    );
    Ok(())
}
