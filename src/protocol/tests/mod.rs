mod extension;
mod playtime_proptest;
mod varint;
