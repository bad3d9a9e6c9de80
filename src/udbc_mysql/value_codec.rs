use crate::udbc::value::Value;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::Value as MyValue;

pub fn from_mysql_value(v: &MyValue) -> Value {
    match v {
        MyValue::NULL => Value::Null,
        MyValue::Int(i) => Value::I64(*i),
        MyValue::UInt(u) => match i64::try_from(*u) {
            Ok(i) => Value::I64(i),
            Err(_) => Value::Str(u.to_string()),
        },
        MyValue::Float(f) => Value::F64(*f as f64),
        MyValue::Double(d) => Value::F64(*d),
        MyValue::Bytes(b) => Value::Bytes(b.clone()),
        MyValue::Date(y, m, d, h, min, s, micro) => {
            let Some(date) = NaiveDate::from_ymd_opt(*y as i32, *m as u32, *d as u32) else {
                // zero dates such as 0000-00-00 have no chrono form
                return Value::Str(format!("{:04}-{:02}-{:02}", y, m, d));
            };
            if *h == 0 && *min == 0 && *s == 0 && *micro == 0 {
                Value::Date(date)
            } else {
                match date.and_hms_micro_opt(*h as u32, *min as u32, *s as u32, *micro) {
                    Some(dt) => Value::DateTime(dt),
                    None => Value::Date(date),
                }
            }
        }
        MyValue::Time(is_neg, days, h, min, s, micro) => {
            let total_h = *days * 24 + (*h as u32);
            let sign = if *is_neg { "-" } else { "" };
            match NaiveTime::from_hms_micro_opt(total_h, *min as u32, *s as u32, *micro) {
                Some(t) if !*is_neg => Value::Time(t),
                // TIME spans -838:59:59..838:59:59, beyond chrono's range
                _ => Value::Str(format!(
                    "{}{:02}:{:02}:{:02}.{:06}",
                    sign, total_h, min, s, micro
                )),
            }
        }
    }
}

pub fn to_mysql_value(v: &Value) -> MyValue {
    match v {
        Value::Null => MyValue::NULL,
        Value::Bool(b) => MyValue::Int(if *b { 1 } else { 0 }),
        Value::I16(i) => MyValue::Int(*i as i64),
        Value::I32(i) => MyValue::Int(*i as i64),
        Value::I64(i) => MyValue::Int(*i),
        Value::U8(u) => MyValue::UInt(*u as u64),
        Value::F64(f) => MyValue::Double(*f),
        Value::Str(s) => MyValue::Bytes(s.clone().into_bytes()),
        Value::Bytes(b) => MyValue::Bytes(b.clone()),
        Value::Date(d) => MyValue::Date(
            d.year() as u16,
            d.month() as u8,
            d.day() as u8,
            0u8,
            0u8,
            0u8,
            0u32,
        ),
        Value::Time(t) => MyValue::Time(
            false,
            0u32,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1000,
        ),
        Value::DateTime(dt) => naive_to_mysql(dt),
        Value::DateTimeUtc(dt) => naive_to_mysql(&dt.naive_utc()),
        Value::Decimal(d) => MyValue::Bytes(d.to_string().into_bytes()),
        Value::List(_) | Value::Map(_) => MyValue::Bytes(v.to_json_text().into_bytes()),
    }
}

fn naive_to_mysql(dt: &NaiveDateTime) -> MyValue {
    MyValue::Date(
        dt.date().year() as u16,
        dt.date().month() as u8,
        dt.date().day() as u8,
        dt.time().hour() as u8,
        dt.time().minute() as u8,
        dt.time().second() as u8,
        dt.and_utc().timestamp_subsec_micros(),
    )
}
