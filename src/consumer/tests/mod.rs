mod calibrator;
