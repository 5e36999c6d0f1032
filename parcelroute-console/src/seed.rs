//! Demo bookings for running the console without a real store.

use std::collections::BTreeSet;

use anyhow::Result;
use parcelroute_core::{
    Actor, Address, BookingFlow, BookingForm, BookingRequest, Contact, CountryCode, CustomerId,
    LineItem, Party, PaymentOption, ShipmentService, ShipmentStatus,
};
use tracing::info;

struct DemoBooking {
    owner: &'static str,
    name: &'static str,
    line1: &'static str,
    city: &'static str,
    postal_code: &'static str,
    form: BookingForm,
    payment_option: PaymentOption,
    advance_to: &'static [ShipmentStatus],
}

fn drums(count: u32, wrapping: bool) -> BookingForm {
    BookingForm::DrumsV1 {
        drums: count,
        wrapping,
        door_to_door: false,
        other_items: Vec::new(),
    }
}

fn demo_bookings() -> Vec<DemoBooking> {
    vec![
        DemoBooking {
            owner: "ama",
            name: "Ama Mensah",
            line1: "12 Mare Street",
            city: "London",
            postal_code: "E8 3RH",
            form: drums(3, true),
            payment_option: PaymentOption::Standard,
            advance_to: &[],
        },
        DemoBooking {
            owner: "kofi",
            name: "Kofi Boateng",
            line1: "4 Broad Street",
            city: "Birmingham",
            postal_code: "B1 2HF",
            form: drums(2, false),
            payment_option: PaymentOption::PayLater,
            advance_to: &[ShipmentStatus::ReadyForPickup],
        },
        DemoBooking {
            owner: "efua",
            name: "Efua Owusu",
            line1: "9 Oldham Road",
            city: "Manchester",
            postal_code: "M4 5JD",
            form: drums(5, false),
            payment_option: PaymentOption::CashOnCollection,
            advance_to: &[
                ShipmentStatus::ReadyForPickup,
                ShipmentStatus::ProcessingOriginWarehouse,
            ],
        },
        DemoBooking {
            owner: "yaw",
            name: "Yaw Asante",
            line1: "1 Sidwell Street",
            city: "Exeter",
            postal_code: "EX4 6NS",
            form: drums(1, false),
            payment_option: PaymentOption::Standard,
            advance_to: &[],
        },
        DemoBooking {
            owner: "akua",
            name: "Akua Darko",
            line1: "22 Briggate",
            city: "Leeds",
            postal_code: "LS1 6HD",
            form: BookingForm::ItemizedV2 {
                items: vec![
                    LineItem::Fixed {
                        item_type: "box".to_owned(),
                        quantity: 4,
                    },
                    LineItem::Custom {
                        description: "Washing machine".to_owned(),
                        quantity: 1,
                    },
                ],
                add_ons: BTreeSet::new(),
            },
            payment_option: PaymentOption::Standard,
            advance_to: &[],
        },
        DemoBooking {
            owner: "kwame",
            name: "Kwame Adjei",
            line1: "3 Sauchiehall Street",
            city: "Glasgow",
            postal_code: "G2 3JD",
            form: drums(4, true),
            payment_option: PaymentOption::PayOnArrival,
            advance_to: &[],
        },
    ]
}

fn party(name: &str, line1: &str, city: &str, postal_code: &str, country: &str) -> Party {
    Party {
        contact: Contact {
            name: name.to_owned(),
            phone: "+44 20 7946 0000".to_owned(),
            email: None,
        },
        address: Address {
            line1: line1.to_owned(),
            city: city.to_owned(),
            postal_code: postal_code.to_owned(),
            country: CountryCode::new(country),
        },
    }
}

/// Book the demo shipments and move some of them along.
pub(crate) async fn seed(service: &ShipmentService, operator: &Actor) -> Result<usize> {
    let bookings = demo_bookings();
    let count = bookings.len();

    for demo in bookings {
        let request = BookingRequest {
            flow: BookingFlow::Web,
            owner: CustomerId(demo.owner.to_owned()),
            sender: party(demo.name, demo.line1, demo.city, demo.postal_code, "GB"),
            recipient: party("Family contact", "Ring Road Central", "Accra", "", "GH"),
            form: demo.form,
            payment_option: demo.payment_option,
        };
        let shipment = service.book(request).await?;
        for status in demo.advance_to {
            service
                .transition(&shipment.id, operator, *status, None)
                .await?;
        }
    }

    info!(count, "seeded demo bookings");
    Ok(count)
}
