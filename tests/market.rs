use citizen_sim::id::{BuildingId, CitizenId};
use citizen_sim::model::{BuildingKind, ItemName, Position, move_item_between, Inventory};
use citizen_sim::sim::market::{
    EnterMarketQueue, MarketServe, MarketTradeItemWith, join_queue, leave_queue,
    market_get_queue_position, queue_slot_position,
};
use citizen_sim::sim::state_stack::{CitizenState, ReturnedData, TaskStep};
use citizen_sim::sim::tasks::Wait;
use citizen_sim::testutil::TestWorld;

fn food_market(tw: &mut TestWorld) -> (CitizenId, BuildingId) {
    let merchant = tw.citizen("Mo", Position::new(200.0, 200.0));
    let market = tw.building(BuildingKind::FoodMarket, merchant, Position::new(200.0, 200.0));
    (merchant, market)
}

#[test]
fn moving_more_than_held_moves_what_is_there() {
    let mut seller = Inventory::new(10);
    let mut buyer = Inventory::new(10);
    seller.put_item_into(ItemName::Wheat, 2, Vec::new());
    buyer.put_item_into(ItemName::Wheat, 1, Vec::new());

    let moved = move_item_between(ItemName::Wheat, &mut seller, &mut buyer, Some(3));
    assert_eq!(moved, 2);
    assert_eq!(seller.get_amount(ItemName::Wheat), 0);
    assert_eq!(buyer.get_amount(ItemName::Wheat), 3);
}

#[test]
fn selling_three_with_only_two_sells_two() {
    let mut tw = TestWorld::new();
    let (merchant, market) = food_market(&mut tw);
    let customer = tw.citizen("Cy", Position::new(200.0, 260.0));
    tw.give(customer, ItemName::Mushroom, 2);
    let merchant_money = tw.world.expect_citizen(merchant).money;
    let customer_money = tw.world.expect_citizen(customer).money;
    let price = tw.world.map.building(market).unwrap().buy_price(ItemName::Mushroom);

    let mut serve = MarketServe::new(market).into_state(0);
    let mut sell = MarketTradeItemWith::sell(market, ItemName::Mushroom, 3).into_state(0);
    let done = tw.run_pair(customer, &mut sell, merchant, &mut serve, 2_000);
    assert_eq!(done, TaskStep::Success(Some(ReturnedData::Amount { amount: 2 })));

    let c = tw.world.expect_citizen(customer);
    assert_eq!(c.inventory.get_amount(ItemName::Mushroom), 0);
    assert_eq!(c.money, customer_money + 2 * price);
    assert_eq!(tw.world.expect_citizen(merchant).money, merchant_money - 2 * price);
    let stock = tw.world.map.building(market).unwrap().inventory.get_amount(ItemName::Mushroom);
    assert_eq!(stock, 2);
}

#[test]
fn second_customer_waits_at_slot_one_until_the_first_leaves() {
    let mut tw = TestWorld::new();
    let (_, market) = food_market(&mut tw);
    let first = tw.citizen("First", Position::default());
    let second = tw.citizen("Second", Position::default());

    let front = queue_slot_position(&tw.world, market, 0).unwrap();
    tw.world.expect_citizen_mut(first).position = front;
    join_queue(&mut tw.world.map, market, first);
    let behind = queue_slot_position(&tw.world, market, 1).unwrap();
    tw.world.expect_citizen_mut(second).position = behind.offset(0.0, 15.0);

    let mut queueing = CitizenState::new(EnterMarketQueue::new(market), 0);
    assert_eq!(tw.run_frame(second, &mut queueing, 100), TaskStep::Running);
    assert_eq!(market_get_queue_position(&mut tw.world, market, second), Some(1));
    assert_eq!(market_get_queue_position(&mut tw.world, market, first), Some(0));
    assert!(tw.world.expect_citizen(second).position.distance(&behind) <= 1.0);

    leave_queue(&mut tw.world.map, market, first);
    assert_eq!(tw.run_frame(second, &mut queueing, 100), TaskStep::Success(None));
    assert_eq!(market_get_queue_position(&mut tw.world, market, second), Some(0));
    assert!(tw.world.expect_citizen(second).position.distance(&front) <= 1.0);
}

#[test]
fn trade_is_abandoned_when_the_merchant_dies() {
    let mut tw = TestWorld::new();
    let (merchant, market) = food_market(&mut tw);
    let customer = tw.citizen("Cy", Position::new(200.0, 260.0));
    tw.world.expect_citizen_mut(customer).money = 50;

    let mut buy = MarketTradeItemWith::buy(market, ItemName::Mushroom, 1).into_state(0);
    tw.tick_frame(customer, &mut buy);
    tw.kill(merchant);
    assert_eq!(tw.tick_frame(customer, &mut buy), TaskStep::Failed);
    assert_eq!(market_get_queue_position(&mut tw.world, market, customer), None);
}

#[test]
fn customer_who_asked_while_the_merchant_was_away_still_gets_served() {
    let mut tw = TestWorld::new();
    let (merchant, market) = food_market(&mut tw);
    tw.world
        .map
        .building_mut(market)
        .unwrap()
        .inventory
        .put_item_into(ItemName::Mushroom, 5, Vec::new());
    let customer = tw.citizen("Cy", Position::new(200.0, 260.0));
    tw.world.expect_citizen_mut(customer).money = 50;

    let mut buy = MarketTradeItemWith::buy(market, ItemName::Mushroom, 2).into_state(0);
    let mut away = CitizenState::new(Wait { until: u64::MAX }, 0);
    assert_eq!(tw.run_pair(customer, &mut buy, merchant, &mut away, 300), TaskStep::Running);
    let waiting = tw.world.expect_citizen(customer).top_state().unwrap().name();
    assert_eq!(waiting, "market_trade_interaction");

    let mut serve = MarketServe::new(market).into_state(tw.world.time);
    let done = tw.run_pair(customer, &mut buy, merchant, &mut serve, 2_000);
    assert_eq!(done, TaskStep::Success(Some(ReturnedData::Amount { amount: 2 })));
    assert_eq!(tw.world.expect_citizen(customer).inventory.get_amount(ItemName::Mushroom), 2);
}
