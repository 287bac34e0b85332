//! Sample notification used by the development-only simulation endpoint.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

/// A single-record notification shaped like the bank's, timestamped now.
pub fn sample_notification() -> Value {
    json!({
        "pix": [
            {
                "endToEndId": "E60746948202103082223A7540Db1234",
                "txid": "123234443",
                "valor": "100.00",
                "componentesValor": {
                    "original": { "valor": "100.00" }
                },
                "chave": "baaf230c-a642-546d-1254-aa16ae7c8dc6",
                "horario": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                "infoPagador": "Pedido XYZ",
                "pagador": {
                    "cpf": "93492239293",
                    "nome": "VICTOR LOPES DORNELES"
                }
            }
        ]
    })
}
