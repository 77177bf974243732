use core::cell::RefCell;

use bleps::{
    ad_structure::{
        create_advertising_data, AdStructure, BR_EDR_NOT_SUPPORTED, LE_GENERAL_DISCOVERABLE,
    },
    async_attribute_server::AttributeServer,
    asynch::Ble,
    attribute_server::NotificationData,
};
use domino_draw::Inbox;
use domino_protocol::{read_at, Status, DEVICE_NAME};
use embassy_sync::{
    blocking_mutex::{self, raw::CriticalSectionRawMutex},
    signal::Signal,
};
use esp32c3_hal::peripherals::BT;
use esp_wifi::{ble::controller::asynch::BleConnector, EspWifiInitialization};

/// Everything the GATT callbacks hand over to the control loop.
pub static INBOX: Inbox = Inbox::new();

// The status characteristic can be read at any time, so the control loop
// keeps a copy of the latest record here.
static STATUS: blocking_mutex::Mutex<CriticalSectionRawMutex, RefCell<[u8; Status::LEN]>> =
    blocking_mutex::Mutex::new(RefCell::new([0; Status::LEN]));

static STATUS_PUSH: Signal<CriticalSectionRawMutex, [u8; Status::LEN]> = Signal::new();

pub fn set_status(status: [u8; Status::LEN]) {
    STATUS.lock(|s| *s.borrow_mut() = status);
}

/// Sends a status notification to the client, if it subscribed.
pub fn push_status(status: [u8; Status::LEN]) {
    set_status(status);
    STATUS_PUSH.signal(status);
}

#[embassy_executor::task]
pub async fn ble_task(init: EspWifiInitialization, mut bt_peripheral: BT) {
    let connector = BleConnector::new(&init, &mut bt_peripheral);
    let mut ble = Ble::new(connector, esp_wifi::current_millis);

    loop {
        ble.init().await.unwrap();
        ble.cmd_set_le_advertising_parameters().await.unwrap();
        ble.cmd_set_le_advertising_data(
            create_advertising_data(&[
                AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
                AdStructure::CompleteLocalName(DEVICE_NAME),
            ])
            .unwrap(),
        )
        .await
        .unwrap();
        ble.cmd_set_le_advertise_enable(true).await.unwrap();
        log::info!("advertising as {DEVICE_NAME}");

        // bleps doesn't tell us when a client connects, so we count the
        // first access to any characteristic as the start of a connection.
        let mut status_read = |offset: usize, data: &mut [u8]| {
            INBOX.set_connected(true);
            let buf = STATUS.lock(|s| *s.borrow());
            read_at(&buf, offset, data)
        };

        let mut manual_write = |_offset: usize, data: &[u8]| {
            INBOX.set_connected(true);
            INBOX.receive_manual(data);
        };

        let mut draw_write = |_offset: usize, data: &[u8]| {
            INBOX.set_connected(true);
            INBOX.receive_fragment(data);
        };

        // The gatt macro wants literal uuids; these are the ones in `domino_protocol`.
        bleps::gatt!([service {
            uuid: "faa94de0-cd7c-43fa-b71d-40324ff9ab2b",
            characteristics: [
                characteristic {
                    name: "status",
                    uuid: "b43a1a69-5dc4-4573-b47c-53e31ca661f2",
                    read: status_read,
                    notify: true,
                },
                characteristic {
                    uuid: "874b19c2-4bfa-4453-83b4-e0d3a28317fd",
                    write: manual_write,
                },
                characteristic {
                    uuid: "56d0d406-5ae9-4e66-8ff7-bd43c12e6263",
                    write: draw_write,
                },
            ],
        },]);

        let mut srv = AttributeServer::new(&mut ble, &mut gatt_attributes);
        let mut notifier = || async {
            let status = STATUS_PUSH.wait().await;
            NotificationData::new(status_handle, &status)
        };
        srv.run(&mut notifier).await.unwrap();

        log::info!("client disconnected");
        INBOX.set_connected(false);
    }
}
