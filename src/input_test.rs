use super::*;

#[test]
fn modifiers_default_to_none() {
    assert_eq!(Modifiers::none(), Modifiers { shift: false, ctrl: false, alt: false, meta: false });
}

#[test]
fn pointer_input_builders() {
    let owner = uuid::Uuid::new_v4();
    let input = PointerInput::new(7, 1.0, 2.0, 30.0)
        .with_owner(owner)
        .with_button(Button::Secondary)
        .with_modifiers(Modifiers { shift: true, ..Modifiers::none() });
    assert_eq!(input.pointer_id, PointerId(7));
    assert_eq!(input.screen, Point::new(1.0, 2.0));
    assert_eq!(input.owner, Some(owner));
    assert_eq!(input.button, Button::Secondary);
    assert!(input.modifiers.shift);
}

#[test]
fn wheel_input_keeps_signed_delta() {
    let wheel = WheelInput::new(0.0, 0.0, -3.0, 12.5);
    assert_eq!(wheel.delta, WheelDelta { dx: -3.0, dy: 12.5 });
    assert!(wheel.owner.is_none());
}

#[test]
fn pointer_id_serializes_as_number() {
    assert_eq!(serde_json::to_string(&PointerId(5)).unwrap(), "5");
}

#[test]
fn button_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Button::Middle).unwrap(), "\"middle\"");
}
