// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests for wire serde roundtrips and sentinel conversions.

use proptest::prelude::*;

use super::*;

proptest! {
    #[test]
    fn envelope_round_trips_any_kind_and_data(
        kind in "[a-z_]{1,24}",
        n in any::<i64>(),
        s in ".{0,64}",
    ) {
        let data = serde_json::json!({"n": n, "s": s});
        let env = Envelope { kind: kind.clone(), data: data.clone() };
        let text = env.encode().unwrap();
        let back = Envelope::parse(&text).unwrap();
        prop_assert_eq!(back.kind, kind);
        prop_assert_eq!(back.data, data);
    }

    #[test]
    fn status_update_round_trips_arbitrary_bytes(
        stdout in proptest::collection::vec(any::<u8>(), 0..256),
        stderr in proptest::collection::vec(any::<u8>(), 0..256),
        exit_code in proptest::option::of(any::<i32>()),
        ts in any::<i64>(),
    ) {
        let req = StatusUpdateRequest {
            task_id: "t".to_string(),
            status: "failed".to_string(),
            exit_code,
            error_message: String::new(),
            stdout: stdout.clone(),
            stderr: stderr.clone(),
            timestamp: ts,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: StatusUpdateRequest = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.stdout, stdout);
        prop_assert_eq!(back.stderr, stderr);
        prop_assert_eq!(back.exit_code, exit_code);
    }

    #[test]
    fn exit_code_sentinel_is_stable(code in any::<i32>()) {
        // Wire → internal → wire is identity except for the sentinel,
        // which must collapse to "no code".
        let internal = normalize_exit_code(Some(code));
        if code == -1 {
            prop_assert_eq!(internal, None);
            prop_assert_eq!(wire_exit_code(internal), -1);
        } else {
            prop_assert_eq!(internal, Some(code));
            prop_assert_eq!(wire_exit_code(internal), code);
        }
    }

    #[test]
    fn descriptor_round_trips(
        args in proptest::collection::vec(".{0,16}", 0..4),
        timeout in 0i64..86_400,
        privileged in any::<bool>(),
    ) {
        let desc = TaskDescriptor {
            task_id: "t".to_string(),
            job_id: "j".to_string(),
            kind: "shell".to_string(),
            args: args.clone(),
            timeout_seconds: timeout,
            privileged,
            ..TaskDescriptor::default()
        };
        let json = serde_json::to_string(&desc).unwrap();
        let back: TaskDescriptor = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, desc);
    }
}
