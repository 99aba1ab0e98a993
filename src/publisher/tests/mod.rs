mod assigner_proptest;
mod pipeline;
