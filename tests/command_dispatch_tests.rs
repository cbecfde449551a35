//! 命令分发集成测试
//!
//! 测试覆盖：权限检查、固件检查、设备串行化、超时、取消、传输失败

mod common;

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use futures::future::AbortHandle;
    use ironcore_connect::{
        domain::{CommandStatus, DeviceModel, FirmwareVersion, Permission, StaticPermissionGate},
        service::{
            CardanoGetAddress, CardanoSignTransaction, DeviceSession, Executable, TransportError,
        },
        CommandError,
    };
    use serde_json::json;

    use crate::common::{session_with, sign_payload, MockTransport, RecordedCall};

    fn address_payload(index: u32) -> serde_json::Value {
        json!({
            "path": format!("m/1852'/1815'/0'/0/{}", index),
            "protocolMagic": 764824073u32,
            "showOnTrezor": false
        })
    }

    #[tokio::test]
    async fn test_sign_transaction_end_to_end() {
        let device = MockTransport::model_t();
        let journal = device.journal();
        let session = session_with(device);

        let mut command = session
            .build::<CardanoSignTransaction>(&sign_payload())
            .unwrap();
        assert_eq!(command.status(), CommandStatus::Validated);

        let response = session.execute(&mut command).await.unwrap();
        assert_eq!(
            response.hash,
            "73e09bdebf98a9e0f17f86a2d11e0f14f4f8dae77cdf26ff1678e821f20c8db6"
        );
        assert!(response.serialized_tx.starts_with("83a4"));
        assert_eq!(command.status(), CommandStatus::Completed);

        // 设备只收到一次调用，参数为规范化后的结果
        let journal = journal.lock().unwrap();
        assert_eq!(journal.calls.len(), 1);
        match &journal.calls[0] {
            RecordedCall::SignTx {
                inputs,
                outputs,
                fee,
                ttl,
                protocol_magic,
            } => {
                assert_eq!(inputs[0].address_n.len(), 5);
                assert_eq!(inputs[0].prev_index, 0);
                assert!(!outputs[0].is_change());
                assert!(outputs[1].is_change());
                assert_eq!(fee, "42");
                assert_eq!(ttl, "10");
                assert_eq!(*protocol_magic, 764824073);
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_is_terminal() {
        let device = MockTransport::model_t().with_failure(TransportError::device(
            "Failure_ActionCancelled",
            "Cancelled by user",
        ));
        let journal = device.journal();
        let session = session_with(device);

        let mut command = session
            .build::<CardanoSignTransaction>(&sign_payload())
            .unwrap();
        let err = session.execute(&mut command).await.unwrap_err();

        assert_eq!(
            err,
            CommandError::TransportFailure(TransportError::device(
                "Failure_ActionCancelled",
                "Cancelled by user"
            ))
        );
        assert_eq!(err.code(), "transport_failure");
        assert_eq!(command.status(), CommandStatus::Failed);
        assert_eq!(command.failure(), Some(&err));

        // 不重试
        assert_eq!(journal.lock().unwrap().calls.len(), 1);

        // 失败的命令不能再次执行
        let again = session.execute(&mut command).await.unwrap_err();
        assert!(matches!(again, CommandError::InvalidState { .. }));
        assert_eq!(journal.lock().unwrap().calls.len(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_before_device_call() {
        let device = MockTransport::model_t();
        let journal = device.journal();
        let session = DeviceSession::new(
            Box::new(device),
            Arc::new(StaticPermissionGate::new([Permission::Read])),
        );

        let err = session
            .call("cardanoSignTransaction", &sign_payload())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::PermissionDenied(
                "cardanoSignTransaction requires permissions: write".into()
            )
        );
        assert!(journal.lock().unwrap().calls.is_empty());

        // 只读方法仍然可用
        let value = session
            .call("cardanoGetAddress", &address_payload(0))
            .await
            .unwrap();
        assert_eq!(value["address"], "addr1q9mock");
    }

    #[tokio::test]
    async fn test_firmware_too_old() {
        let device = MockTransport::new(DeviceModel::T, FirmwareVersion::new(2, 0, 7));
        let journal = device.journal();
        let session = session_with(device);

        let mut command = session
            .build::<CardanoGetAddress>(&address_payload(0))
            .unwrap();
        let err = session.execute(&mut command).await.unwrap_err();

        assert_eq!(err.code(), "firmware_not_supported");
        assert_eq!(command.status(), CommandStatus::Failed);
        assert!(journal.lock().unwrap().calls.is_empty());
    }

    #[tokio::test]
    async fn test_model_one_unsupported() {
        let session = session_with(MockTransport::new(
            DeviceModel::One,
            FirmwareVersion::new(1, 12, 1),
        ));
        let err = session
            .call("cardanoGetPublicKey", &json!({ "path": "m/1852'/1815'/0'" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::FirmwareNotSupported {
                model: DeviceModel::One,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_device_calls_are_serialized() {
        let device = MockTransport::model_t().with_delay(Duration::from_millis(30));
        let journal = device.journal();
        let session = session_with(device);

        let mut first = session
            .build::<CardanoGetAddress>(&address_payload(1))
            .unwrap();
        let mut second = session
            .build::<CardanoGetAddress>(&address_payload(2))
            .unwrap();

        let (a, b) = tokio::join!(session.execute(&mut first), session.execute(&mut second));
        assert!(a.is_ok());
        assert!(b.is_ok());

        let journal = journal.lock().unwrap();
        assert_eq!(journal.calls.len(), 2);
        // 同一时刻只有一个调用在设备上执行
        assert_eq!(journal.max_in_flight, 1);
    }

    #[tokio::test]
    async fn test_timeout_marks_failed() {
        let device = MockTransport::model_t().with_delay(Duration::from_millis(500));
        let session = session_with(device).with_call_timeout(Some(Duration::from_millis(20)));

        let mut command = session
            .build::<CardanoGetAddress>(&address_payload(0))
            .unwrap();
        let err = session.execute(&mut command).await.unwrap_err();

        assert_eq!(err, CommandError::Timeout(20));
        assert!(err.is_retryable());
        assert_eq!(command.status(), CommandStatus::Failed);
    }

    #[tokio::test]
    async fn test_abort_in_flight_call() {
        let device = MockTransport::model_t().with_delay(Duration::from_secs(10));
        let session = session_with(device);

        let mut command = session
            .build::<CardanoSignTransaction>(&sign_payload())
            .unwrap();
        let (handle, registration) = AbortHandle::new_pair();

        let (result, _) = tokio::join!(
            session.execute_with_abort(&mut command, registration),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                handle.abort();
            }
        );

        assert_eq!(result.unwrap_err(), CommandError::Cancelled);
        assert_eq!(command.status(), CommandStatus::Failed);
    }

    #[tokio::test]
    async fn test_dropped_call_is_cancelled_and_releases_device() {
        let device = MockTransport::model_t().with_delay(Duration::from_millis(200));
        let journal = device.journal();
        let session = session_with(device);

        let mut command = session
            .build_dynamic("cardanoGetAddress", &address_payload(3))
            .unwrap();
        let outer =
            tokio::time::timeout(Duration::from_millis(20), session.execute(&mut command)).await;
        assert!(outer.is_err());

        assert_eq!(Executable::status(&command), CommandStatus::Failed);
        assert_eq!(command.failure(), Some(&CommandError::Cancelled));
        assert!(matches!(
            session.execute(&mut command).await.unwrap_err(),
            CommandError::InvalidState {
                from: CommandStatus::Failed,
                ..
            }
        ));

        // 设备锁随 future 一起释放
        let mut next = session
            .build::<CardanoGetAddress>(&address_payload(4))
            .unwrap();
        session.execute(&mut next).await.unwrap();
        assert_eq!(next.status(), CommandStatus::Completed);
        assert_eq!(journal.lock().unwrap().calls.len(), 2);
    }

    #[tokio::test]
    async fn test_dynamic_dispatch_by_name() {
        let device = MockTransport::model_t();
        let journal = device.journal();
        let session = session_with(device);

        let mut command = session
            .build_dynamic("cardanoGetAddress", &address_payload(7))
            .unwrap();
        assert_eq!(command.meta().name, "cardanoGetAddress");

        let value = session.execute(&mut command).await.unwrap();
        assert_eq!(value["path"][4], 7);
        assert_eq!(value["serializedPath"], "m/1852'/1815'/0'/0/7");
        assert_eq!(Executable::status(&command), CommandStatus::Completed);

        match &journal.lock().unwrap().calls[0] {
            RecordedCall::GetAddress { show_display, .. } => assert!(!show_display),
            other => panic!("unexpected call: {:?}", other),
        }

        let err = session.call("cardanoSignMessage", &json!({})).await.unwrap_err();
        assert_eq!(err, CommandError::UnknownMethod("cardanoSignMessage".into()));
    }
}
